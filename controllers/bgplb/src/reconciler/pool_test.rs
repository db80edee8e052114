//! Unit tests for the pool reconcilers

#[cfg(test)]
mod tests {
    use crate::store::MockWrite;
    use crate::test_utils::*;
    use crds::PoolState;

    #[tokio::test]
    async fn test_ip_pool_registers_and_reports_usage() {
        let (reconciler, store) = create_test_reconciler(&[]).await;
        let pool = ip_pool("pool-a", "10.0.0.0/29");

        reconciler.reconcile_ip_pool(&pool).await.unwrap();

        assert_eq!(reconciler.ipam.lock().await.prefixes().len(), 1);
        let status = store.ip_pool_status("pool-a").unwrap();
        assert_eq!(status.state, PoolState::Ready);
        assert_eq!(status.cidr.as_deref(), Some("10.0.0.0/29"));
        assert_eq!(status.total, 6);
        assert_eq!(status.used, 0);
        assert_eq!(status.free, 6);
        assert!(status.last_reconciled.is_some());
    }

    #[tokio::test]
    async fn test_ip_pool_reports_allocated_addresses() {
        let (reconciler, store) = create_test_reconciler(&["10.0.0.0/29"]).await;
        store.add_service(with_finalizer(load_balancer_service("default", "web")));
        reconciler.reconcile_service(&key("default", "web")).await.unwrap();

        reconciler.reconcile_ip_pool(&ip_pool("pool-a", "10.0.0.0/29")).await.unwrap();

        let status = store.ip_pool_status("pool-a").unwrap();
        assert_eq!(status.used, 1);
        assert_eq!(status.free, 5);
        assert_eq!(status.allocated, vec!["10.0.0.1".to_string()]);
        // Same range registered once
        assert_eq!(reconciler.ipam.lock().await.prefixes().len(), 1);
    }

    #[tokio::test]
    async fn test_ip_pool_with_invalid_cidr_is_marked_invalid() {
        let (reconciler, store) = create_test_reconciler(&[]).await;

        reconciler.reconcile_ip_pool(&ip_pool("broken", "10.0.0.0/33")).await.unwrap();

        let status = store.ip_pool_status("broken").unwrap();
        assert_eq!(status.state, PoolState::Invalid);
        assert!(status.error.is_some());
        assert!(reconciler.ipam.lock().await.prefixes().is_empty());
    }

    #[tokio::test]
    async fn test_ip_pool_overlapping_another_pool_is_marked_invalid() {
        let (reconciler, store) = create_test_reconciler(&["10.0.0.0/24"]).await;

        reconciler.reconcile_ip_pool(&ip_pool("inner", "10.0.0.64/26")).await.unwrap();

        let status = store.ip_pool_status("inner").unwrap();
        assert_eq!(status.state, PoolState::Invalid);
        assert!(status.error.unwrap().contains("10.0.0.0/24"));
        assert_eq!(status.total, 0);
        assert_eq!(reconciler.ipam.lock().await.prefixes().len(), 1);
    }

    #[tokio::test]
    async fn test_ip_pool_status_written_only_on_change() {
        let (reconciler, store) = create_test_reconciler(&[]).await;
        let mut pool = ip_pool("pool-a", "10.0.0.0/29");
        reconciler.reconcile_ip_pool(&pool).await.unwrap();

        pool.status = store.ip_pool_status("pool-a");
        reconciler.reconcile_ip_pool(&pool).await.unwrap();

        assert_eq!(store.writes(), vec![MockWrite::IpPoolStatus("pool-a".to_string())]);
    }

    #[tokio::test]
    async fn test_ip_pool_status_write_failure_is_returned() {
        let (reconciler, store) = create_test_reconciler(&[]).await;
        store.set_fail_writes(true);

        let result = reconciler.reconcile_ip_pool(&ip_pool("pool-a", "10.0.0.0/29")).await;

        assert!(result.is_err());
        // Registration itself is kept
        assert_eq!(reconciler.ipam.lock().await.prefixes().len(), 1);
    }

    #[tokio::test]
    async fn test_bgp_configuration_registers_valid_cidrs() {
        let (reconciler, store) = create_test_reconciler(&[]).await;
        let config = bgp_configuration("default", &["10.0.0.0/30", "bogus", "10.1.0.7/24"]);

        reconciler.reconcile_bgp_configuration(&config).await.unwrap();

        let status = store.bgp_configuration_status("default").unwrap();
        assert_eq!(status.registered_cidrs, vec!["10.0.0.0/30", "10.1.0.0/24"]);
        assert_eq!(status.rejected_cidrs.len(), 1);
        assert!(status.rejected_cidrs[0].starts_with("bogus: "));

        let ipam = reconciler.ipam.lock().await;
        let nets: Vec<String> = ipam.prefixes().iter().map(|p| p.net().to_string()).collect();
        assert_eq!(nets, vec!["10.0.0.0/30", "10.1.0.0/24"]);
    }

    #[tokio::test]
    async fn test_bgp_configuration_with_other_name_is_ignored() {
        let (reconciler, store) = create_test_reconciler(&[]).await;

        reconciler
            .reconcile_bgp_configuration(&bgp_configuration("other", &["10.0.0.0/30"]))
            .await
            .unwrap();

        assert!(store.writes().is_empty());
        assert!(reconciler.ipam.lock().await.prefixes().is_empty());
    }

    #[tokio::test]
    async fn test_bgp_configuration_status_written_only_on_change() {
        let (reconciler, store) = create_test_reconciler(&[]).await;
        let mut config = bgp_configuration("default", &["10.0.0.0/30"]);
        reconciler.reconcile_bgp_configuration(&config).await.unwrap();

        config.status = store.bgp_configuration_status("default");
        reconciler.reconcile_bgp_configuration(&config).await.unwrap();
        assert_eq!(store.writes().len(), 1);

        // A new entry changes the outcome
        config.spec.service_external_ips.push(crds::ServiceExternalIPBlock {
            cidr: "10.2.0.0/24".to_string(),
        });
        reconciler.reconcile_bgp_configuration(&config).await.unwrap();
        assert_eq!(store.writes().len(), 2);
        assert_eq!(
            store.bgp_configuration_status("default").unwrap().registered_cidrs,
            vec!["10.0.0.0/30", "10.2.0.0/24"]
        );
    }
}
