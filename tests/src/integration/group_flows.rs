//! # Group Flows
//!
//! Group bundles carry no key material: the reader joins through the issuer
//! and the generator side only tracks usage.

#[cfg(test)]
mod tests {
    use super::super::support::Network;
    use portline_core::domain::ChatKind;
    use portline_core::{CreatePortRequest, IssuerCall, PortError, PortProtocolApi};

    fn group_port(group_id: &str) -> CreatePortRequest {
        CreatePortRequest::Group {
            group_id: group_id.into(),
            name: "Climbers".into(),
            description: Some("Tuesday sessions".into()),
        }
    }

    fn group_superport(group_id: &str, regenerate: bool) -> CreatePortRequest {
        CreatePortRequest::GroupSuperport {
            group_id: group_id.into(),
            name: "Climbers".into(),
            description: None,
            limit: None,
            regenerate,
        }
    }

    #[tokio::test]
    async fn test_group_port_admits_reader_once() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");

        let mut port = alice.service.try_create_port(group_port("G1")).await.unwrap();
        let port_id = port.port_id().to_string();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();

        bob.scan(&bundle).await.unwrap();
        let chats = bob.backend.connections.chats();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].kind, ChatKind::Group);
        assert_eq!(bob.backend.store.read_count(), 0);
        assert!(bob.backend.permissions.is_empty());

        // The admin marks the invitation used once the member shows up.
        alice.service.consume_group_port(&port_id).await.unwrap();
        let err = alice.service.consume_group_port(&port_id).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rescanning_a_joined_group_adds_no_chat() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");

        let mut port = alice
            .service
            .try_create_port(group_superport("G1", false))
            .await
            .unwrap();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();

        bob.scan(&bundle).await.unwrap();
        bob.scan(&bundle).await.unwrap();
        assert_eq!(bob.backend.connections.chats().len(), 1);
        assert_eq!(bob.backend.store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_group_superport_admits_many_readers() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");
        let carol = net.user("Carol");

        let mut port = alice
            .service
            .try_create_port(group_superport("G1", false))
            .await
            .unwrap();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();

        bob.scan(&bundle).await.unwrap();
        carol.scan(&bundle).await.unwrap();

        let bob_chat = bob.backend.connections.chats().remove(0);
        let carol_chat = carol.backend.connections.chats().remove(0);
        assert_eq!(bob_chat.group_id, carol_chat.group_id);
        assert_ne!(bob_chat.line_id, carol_chat.line_id);
    }

    #[tokio::test]
    async fn test_group_superport_is_one_per_group() {
        let net = Network::new();
        let alice = net.user("Alice");

        let first = alice
            .service
            .try_create_port(group_superport("G1", false))
            .await
            .unwrap();
        let again = alice
            .service
            .try_create_port(group_superport("G1", false))
            .await
            .unwrap();
        assert_eq!(first.port_id(), again.port_id());

        let regenerated = alice
            .service
            .try_create_port(group_superport("G1", true))
            .await
            .unwrap();
        assert_ne!(regenerated.port_id(), first.port_id());
        assert_eq!(alice.backend.store.generated_count(), 1);

        let other = alice
            .service
            .try_create_port(group_superport("G2", false))
            .await
            .unwrap();
        assert_ne!(other.port_id(), regenerated.port_id());
        assert_eq!(alice.backend.store.generated_count(), 2);
    }

    #[tokio::test]
    async fn test_group_join_outage_keeps_bundle() {
        let net = Network::new();
        let alice = net.user("Alice");
        let bob = net.user("Bob");

        let mut port = alice.service.try_create_port(group_port("G1")).await.unwrap();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();

        net.issuer.fail(
            IssuerCall::JoinGroup,
            PortError::TransientIssuer("offline".into()),
        );
        bob.scan(&bundle).await.unwrap();
        assert_eq!(bob.backend.store.read_count(), 1);
        assert!(bob.backend.connections.chats().is_empty());

        net.issuer.recover(IssuerCall::JoinGroup);
        let report = bob.service.process_read_bundles().await.unwrap();
        assert_eq!(report.consumed, 1);
        assert_eq!(bob.backend.connections.chats().len(), 1);
    }
}
