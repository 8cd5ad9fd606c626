//! # Direct Port and Superport Flows
//!
//! Alice generates, Bob and Carol read. The issuer relays each line request
//! back to Alice's service as a connection notification.

#[cfg(test)]
mod tests {
    use super::super::support::Network;
    use portline_core::{
        ConnectionStore, CreatePortRequest, CryptoCollaborator, PortError, PortKind,
        PortProtocolApi, PortState,
    };

    fn direct_request() -> CreatePortRequest {
        CreatePortRequest::Direct {
            label: Some("Bob".into()),
            folder_id: None,
            permissions: None,
            expires_in: None,
        }
    }

    fn superport_request(limit: u32) -> CreatePortRequest {
        CreatePortRequest::Superport {
            label: None,
            limit,
            folder_id: Some("friends".into()),
            permissions: None,
        }
    }

    // =============================================================================
    // DIRECT PORTS
    // =============================================================================

    #[tokio::test]
    async fn test_direct_port_connects_both_sides() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");

        let mut port = alice.service.try_create_port(direct_request()).await.unwrap();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();

        net.expect_line("L1", "PA");
        bob.scan(&bundle).await.unwrap();
        net.relay(&alice, "PB").await.unwrap();

        let bob_chat = bob.chat_with("PA").await.unwrap();
        let alice_chat = alice.chat_with("PB").await.unwrap();
        assert_eq!(bob_chat.line_id, "L1");
        assert_eq!(alice_chat.line_id, "L1");

        let bob_contact = bob.backend.connections.get_contact(&"PA".to_string()).await.unwrap().unwrap();
        let alice_contact = alice.backend.connections.get_contact(&"PB".to_string()).await.unwrap().unwrap();
        assert_eq!(bob_contact.name, "Alice");
        assert_eq!(alice_contact.name, "Bob");

        // Both sides derived the same key for the line.
        let alice_line = alice.backend.connections.get_line(&"L1".to_string()).await.unwrap().unwrap();
        let bob_line = bob.backend.connections.get_line(&"L1".to_string()).await.unwrap().unwrap();
        let sealed = bob
            .backend
            .crypto
            .encrypt(bob_line.crypto_id.as_ref().unwrap(), "hello")
            .await
            .unwrap();
        let opened = alice
            .backend
            .crypto
            .decrypt(alice_line.crypto_id.as_ref().unwrap(), &sealed)
            .await
            .unwrap();
        assert_eq!(opened, "hello");

        // Single use: the port and the pending bundle are gone.
        assert_eq!(alice.backend.store.generated_count(), 0);
        assert_eq!(bob.backend.store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_direct_port_rejects_second_reader() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");
        let carol = net.user("Carol");

        let mut port = alice.service.try_create_port(direct_request()).await.unwrap();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();

        net.expect_line("L1", "PA");
        bob.scan(&bundle).await.unwrap();
        net.relay(&alice, "PB").await.unwrap();

        net.expect_line("L2", "PA");
        carol.scan(&bundle).await.unwrap();
        let err = net.relay(&alice, "PC").await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
        assert!(alice.chat_with("PC").await.is_none());
    }

    #[tokio::test]
    async fn test_fallback_link_reads_like_json() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");

        let mut port = alice.service.try_create_port(direct_request()).await.unwrap();
        let bundle = port.get_shareable_bundle().await.unwrap();
        let link = portline_core::bundle_to_fallback_link(
            "https://porting.me/bundle",
            &bundle.to_value().unwrap(),
        )
        .unwrap();

        let record = bob.service.try_read_bundle(&link, None, None).await.unwrap();
        assert_eq!(record.port_id, port.port_id());
        assert_eq!(record.target, PortKind::Direct);
    }

    // =============================================================================
    // SUPERPORTS
    // =============================================================================

    #[tokio::test]
    async fn test_superport_enforces_limit() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");
        let carol = net.user("Carol");

        let mut port = alice.service.try_create_port(superport_request(1)).await.unwrap();
        let port_id = port.port_id().to_string();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();

        net.expect_line("L1", "PA");
        bob.scan(&bundle).await.unwrap();
        net.relay(&alice, "PB").await.unwrap();
        let chat = alice.chat_with("PB").await.unwrap();
        assert_eq!(chat.folder_id, "friends");

        net.expect_line("L2", "PA");
        carol.scan(&bundle).await.unwrap();
        let err = net.relay(&alice, "PC").await.unwrap_err();
        assert!(matches!(err, PortError::Capacity { .. }));
        assert!(alice.chat_with("PC").await.is_none());

        let summaries = alice.service.list_generated_ports().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].port_id, port_id);
        assert_eq!(summaries[0].connections_made, Some(1));
        assert_eq!(summaries[0].state, PortState::Paused);
    }

    #[tokio::test]
    async fn test_paused_superport_refuses_until_resumed() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");
        let carol = net.user("Carol");

        let mut port = alice.service.try_create_port(superport_request(5)).await.unwrap();
        let port_id = port.port_id().to_string();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();
        alice.service.pause_port(&port_id).await.unwrap();

        net.expect_line("L1", "PA");
        bob.scan(&bundle).await.unwrap();
        let (kind, notified_port, request) = net.last_notification("PB").unwrap();
        let err = alice
            .service
            .on_line_created(kind, &notified_port, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Capacity { .. }));

        alice.service.resume_port(&port_id).await.unwrap();
        net.expect_line("L2", "PA");
        carol.scan(&bundle).await.unwrap();
        net.relay(&alice, "PC").await.unwrap();
        assert_eq!(alice.chat_with("PC").await.unwrap().line_id, "L2");
        assert!(alice.chat_with("PB").await.is_none());
    }

    #[tokio::test]
    async fn test_wrong_kind_notification_is_refused() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");

        let mut port = alice.service.try_create_port(direct_request()).await.unwrap();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();
        bob.scan(&bundle).await.unwrap();

        let (_, port_id, request) = net.last_notification("PB").unwrap();
        let err = alice
            .service
            .on_line_created(PortKind::Superport, &port_id, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
        assert_eq!(alice.backend.store.generated_count(), 1);
    }
}
