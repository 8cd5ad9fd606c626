//! # Lifecycle Flows
//!
//! Links, the pending-bundle sweep, expiry cleanup and port listing across
//! users.

#[cfg(test)]
mod tests {
    use super::super::support::Network;
    use chrono::Duration;
    use portline_core::{
        clip_name, CreatePortRequest, PortKind, PortProtocolApi, PortState, NAME_LENGTH_LIMIT,
    };
    use proptest::prelude::*;

    fn direct(expires_in: Option<Duration>) -> CreatePortRequest {
        CreatePortRequest::Direct {
            label: None,
            folder_id: None,
            permissions: None,
            expires_in,
        }
    }

    // =============================================================================
    // LINKS
    // =============================================================================

    #[tokio::test]
    async fn test_short_link_reads_after_resolution() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");

        let mut port = alice.service.try_create_port(direct(None)).await.unwrap();
        let link = port.get_shareable_link().await.unwrap();
        let bundle_id = link.strip_prefix("https://porting.me/link/").unwrap();

        // Short links name a bundle the issuer holds; the app resolves them.
        assert!(bob.service.try_read_bundle(&link, None, None).await.is_err());
        let resolved = net.issuer.resolve_bundle_id(bundle_id).unwrap();
        let record = bob
            .service
            .try_read_bundle(&resolved.to_string(), None, None)
            .await
            .unwrap();
        assert_eq!(record.port_id, port.port_id());
    }

    // =============================================================================
    // SWEEP
    // =============================================================================

    #[tokio::test]
    async fn test_concurrent_sweeps_request_one_line_per_bundle() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");

        for _ in 0..3 {
            let mut port = alice.service.try_create_port(direct(None)).await.unwrap();
            let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();
            bob.service.try_read_bundle(&bundle, None, None).await.unwrap();
        }

        let (a, b, c) = tokio::join!(
            bob.service.process_read_bundles(),
            bob.service.process_read_bundles(),
            bob.service.process_read_bundles()
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(net.issuer.line_requests().len(), 3);
        assert_eq!(bob.backend.connections.chats().len(), 3);
        assert_eq!(bob.backend.store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_reading_twice_keeps_one_pending_record() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");

        let mut port = alice.service.try_create_port(direct(None)).await.unwrap();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();
        bob.service.try_read_bundle(&bundle, None, None).await.unwrap();
        bob.service.try_read_bundle(&bundle, None, None).await.unwrap();
        assert_eq!(bob.backend.store.read_count(), 1);
        assert_eq!(bob.backend.crypto.session_count(), 1);

        bob.service.clean_delete_read_port(&port.port_id().to_string()).await.unwrap();
        bob.service.clean_delete_read_port(&port.port_id().to_string()).await.unwrap();
        assert_eq!(bob.backend.store.read_count(), 0);
        assert_eq!(bob.backend.crypto.session_count(), 0);
    }

    // =============================================================================
    // EXPIRY
    // =============================================================================

    #[tokio::test]
    async fn test_expired_bundle_never_requests_a_line() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");

        let mut port = alice
            .service
            .try_create_port(direct(Some(Duration::seconds(-1))))
            .await
            .unwrap();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();
        bob.scan(&bundle).await.unwrap();

        assert!(net.issuer.line_requests().is_empty());
        assert_eq!(bob.backend.store.read_count(), 0);
        assert!(bob.backend.connections.chats().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired_ports_on_both_sides() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");

        let mut stale = alice
            .service
            .try_create_port(direct(Some(Duration::seconds(-1))))
            .await
            .unwrap();
        alice.service.try_create_port(direct(None)).await.unwrap();
        let bundle = stale.get_shareable_bundle().await.unwrap().to_json().unwrap();
        bob.service.try_read_bundle(&bundle, None, None).await.unwrap();

        assert_eq!(alice.service.cleanup_expired_ports().await.unwrap(), 1);
        assert_eq!(bob.service.cleanup_expired_ports().await.unwrap(), 1);
        assert_eq!(alice.backend.store.generated_count(), 1);
        assert_eq!(bob.backend.store.read_count(), 0);
        assert_eq!(bob.backend.crypto.session_count(), 0);
    }

    // =============================================================================
    // LISTING
    // =============================================================================

    #[tokio::test]
    async fn test_listing_reports_state_per_port() {
        let net = Network::new();
        let alice = net.user("Alice");

        let direct_port = alice.service.try_create_port(direct(None)).await.unwrap();
        let superport = alice
            .service
            .try_create_port(CreatePortRequest::Superport {
                label: Some("Club".into()),
                limit: 10,
                folder_id: None,
                permissions: None,
            })
            .await
            .unwrap();
        let superport_id = superport.port_id().to_string();
        alice.service.pause_port(&superport_id).await.unwrap();

        let summaries = alice.service.list_generated_ports().await.unwrap();
        assert_eq!(summaries.len(), 2);
        let listed_super = summaries.iter().find(|s| s.port_id == superport_id).unwrap();
        assert_eq!(listed_super.kind, PortKind::Superport);
        assert_eq!(listed_super.state, PortState::Paused);
        assert_eq!(listed_super.connections_limit, Some(10));
        let listed_direct = summaries
            .iter()
            .find(|s| s.port_id == direct_port.port_id())
            .unwrap();
        assert_eq!(listed_direct.state, PortState::Active);
        assert_eq!(listed_direct.connections_limit, None);
    }

    // =============================================================================
    // NAMES
    // =============================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_any_profile_name_yields_readable_bundle(name in "[A-Za-zÀ-ÿ][A-Za-zÀ-ÿ0-9 ]{0,59}") {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            let bundle_name = runtime.block_on(async {
                let net = Network::new();
                let alice = net.user(&name);
                let bob = net.user("Bob");
                let mut port = alice.service.try_create_port(direct(None)).await.unwrap();
                let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();
                let record = bob.service.try_read_bundle(&bundle, None, None).await.unwrap();
                record.name
            });
            let bundle_name = bundle_name.unwrap();
            prop_assert!(bundle_name.chars().count() <= NAME_LENGTH_LIMIT);
            prop_assert_eq!(bundle_name, clip_name(&name));
        }
    }
}
