#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use crate::deployment::{AlreadyResolvedError, DeploymentError, DeploymentFuture, DeploymentResult, DeploymentStatus};
    use crate::registry::{ServiceName, StartError};

    #[test]
    fn test_second_resolve_keeps_first_value() {
        let future = DeploymentFuture::new();
        assert!(!future.is_done());
        assert!(future.try_result().is_none());

        future.resolve(DeploymentResult::success(5, 2)).expect("first write");
        assert_eq!(
            future.resolve(DeploymentResult::rejected(DeploymentError::internal("late"))),
            Err(AlreadyResolvedError)
        );

        let result = future.get();
        assert!(result.is_success());
        assert_eq!(result.service_count(), 2);
        assert_eq!(result.elapsed_millis(), 5);
    }

    #[test]
    fn test_get_timeout_expires() {
        let future = DeploymentFuture::new();
        assert!(future.get_timeout(Duration::from_millis(20)).is_none());
        assert!(!future.is_done());
    }

    #[test]
    fn test_get_blocks_until_resolved() {
        let future = DeploymentFuture::new();
        let writer = future.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            writer.resolve(DeploymentResult::success(1, 1)).expect("write");
        });

        assert!(future.get_timeout(Duration::from_secs(5)).expect("resolved").is_success());
        handle.join().expect("writer thread");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_wakes_async_readers() {
        let future = DeploymentFuture::new();
        let readers: Vec<_> = (0..3)
            .map(|_| {
                let future = future.clone();
                tokio::spawn(async move { future.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        future
            .resolve(DeploymentResult::rejected(DeploymentError::RootNotFound("/nope".into())))
            .expect("write");

        for reader in readers {
            let result = tokio::time::timeout(Duration::from_secs(5), reader)
                .await
                .expect("reader woke up")
                .expect("reader task");
            assert_eq!(result.status(), DeploymentStatus::Failure);
        }
    }

    #[test]
    fn test_into_result_and_json_shape() {
        let ok = DeploymentResult::success(12, 4);
        assert_eq!(ok.clone().into_result().expect("success"), ok);
        let json = serde_json::to_value(&ok).expect("json");
        assert_eq!(
            json,
            serde_json::json!({"status": "success", "failures": {}, "elapsed_millis": 12, "service_count": 4})
        );

        let mut failures = HashMap::new();
        failures.insert(ServiceName::of(["deployd", "web"]), StartError::failed("port in use"));
        let failed = DeploymentResult::failure(DeploymentError::ServicesFailed(1), failures, 30, 5);
        assert_eq!(failed.failures().len(), 1);

        let json = serde_json::to_value(&failed).expect("json");
        assert_eq!(json["status"], "failure");
        assert_eq!(json["cause"], "1 service(s) failed to start");
        assert_eq!(json["failures"]["deployd.web"], "port in use");

        assert_eq!(failed.into_result().unwrap_err(), DeploymentError::ServicesFailed(1));
    }
}
