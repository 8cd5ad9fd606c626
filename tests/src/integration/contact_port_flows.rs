//! # Contact Port Flows
//!
//! Alice shares her contact port with Bob. Bob passes it on to Carol with a
//! ticket he announces to Alice first; Alice only accepts Carol's intro while
//! that ticket is active.

#[cfg(test)]
mod tests {
    use super::super::support::{Network, User};
    use portline_core::{
        Bundle, CreatePortRequest, PortError, PortKind, PortProtocolApi,
    };

    /// Alice and Bob connected through a direct port: Alice sees Bob as
    /// "PB", Bob sees Alice as "PA", both on line "L1".
    async fn connected(net: &Network) -> (User, User) {
        let alice = net.user("Alice");
        let bob = net.user("Bob");
        let mut port = alice
            .service
            .try_create_port(CreatePortRequest::Direct {
                label: None,
                folder_id: None,
                permissions: None,
                expires_in: None,
            })
            .await
            .unwrap();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();
        net.expect_line("L1", "PA");
        bob.scan(&bundle).await.unwrap();
        net.relay(&alice, "PB").await.unwrap();
        (alice, bob)
    }

    /// Alice's shared port id and the bundle Bob minted from it, with the
    /// ticket already announced to Alice.
    async fn reshared(net: &Network, alice: &User, bob: &User) -> (String, Bundle) {
        let mut shared = alice
            .service
            .try_create_port(CreatePortRequest::SharedContactPort {
                pair_hash: "PB".into(),
                folder_id: None,
            })
            .await
            .unwrap();
        let material = shared.get_shareable_bundle().await.unwrap();
        assert!(material.as_peer().unwrap().ticket.is_none());

        let mut accepted = bob
            .service
            .try_create_port(CreatePortRequest::AcceptedContactPort {
                pair_hash: "PA".into(),
                bundle: material.as_peer().unwrap().clone(),
            })
            .await
            .unwrap();
        let minted = accepted.get_shareable_bundle().await.unwrap();

        let (port_id, ticket, line_id) = net.issuer.announced_tickets().pop().unwrap();
        assert_eq!(port_id, shared.port_id());
        assert_eq!(line_id, "L1");
        assert_eq!(minted.as_peer().unwrap().ticket.as_ref(), Some(&ticket));

        let chat_id = alice.chat_with("PB").await.unwrap().chat_id;
        alice
            .service
            .accept_contact_port_ticket(&port_id, ticket, &chat_id)
            .await
            .unwrap();
        (port_id, minted)
    }

    #[tokio::test]
    async fn test_reshare_connects_third_user() {
        let net = Network::new();
        let (alice, bob) = connected(&net).await;
        let carol = net.user("Carol");
        let (port_id, minted) = reshared(&net, &alice, &bob).await;

        net.expect_line("L2", "PA");
        carol.scan(&minted.to_json().unwrap()).await.unwrap();
        let (kind, notified_port, _) = net.last_notification("PC").unwrap();
        assert_eq!(kind, PortKind::ContactPort);
        assert_eq!(notified_port, port_id);
        net.relay(&alice, "PC").await.unwrap();

        assert_eq!(carol.chat_with("PA").await.unwrap().line_id, "L2");
        assert_eq!(alice.chat_with("PC").await.unwrap().line_id, "L2");
        // The shared port stays for further re-shares.
        assert!(alice.service.load_port(&port_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_ticket_is_single_use() {
        let net = Network::new();
        let (alice, bob) = connected(&net).await;
        let carol = net.user("Carol");
        let dave = net.user("Dave");
        let (_, minted) = reshared(&net, &alice, &bob).await;
        let raw = minted.to_json().unwrap();

        net.expect_line("L2", "PA");
        carol.scan(&raw).await.unwrap();
        net.relay(&alice, "PC").await.unwrap();

        net.expect_line("L3", "PA");
        dave.scan(&raw).await.unwrap();
        let err = net.relay(&alice, "PD").await.unwrap_err();
        assert!(matches!(err, PortError::Verification(_)));
        assert!(alice.chat_with("PD").await.is_none());
        assert!(net.issuer.reported_failures().contains(&"L3".to_string()));
    }

    #[tokio::test]
    async fn test_unannounced_ticket_is_refused() {
        let net = Network::new();
        let (alice, bob) = connected(&net).await;
        let carol = net.user("Carol");

        let mut shared = alice
            .service
            .try_create_port(CreatePortRequest::SharedContactPort {
                pair_hash: "PB".into(),
                folder_id: None,
            })
            .await
            .unwrap();
        let material = shared.get_shareable_bundle().await.unwrap();
        let mut accepted = bob
            .service
            .try_create_port(CreatePortRequest::AcceptedContactPort {
                pair_hash: "PA".into(),
                bundle: material.as_peer().unwrap().clone(),
            })
            .await
            .unwrap();
        let minted = accepted.get_shareable_bundle().await.unwrap();

        // Alice never hears about the ticket.
        carol.scan(&minted.to_json().unwrap()).await.unwrap();
        let err = net.relay(&alice, "PC").await.unwrap_err();
        assert!(matches!(err, PortError::Verification(_)));
    }

    #[tokio::test]
    async fn test_paused_sharing_refuses_tickets() {
        let net = Network::new();
        let (alice, bob) = connected(&net).await;
        let chat_id = alice.chat_with("PB").await.unwrap().chat_id;

        let mut shared = alice
            .service
            .try_create_port(CreatePortRequest::SharedContactPort {
                pair_hash: "PB".into(),
                folder_id: None,
            })
            .await
            .unwrap();
        let port_id = shared.port_id().to_string();
        let material = shared.get_shareable_bundle().await.unwrap();
        let mut accepted = bob
            .service
            .try_create_port(CreatePortRequest::AcceptedContactPort {
                pair_hash: "PA".into(),
                bundle: material.as_peer().unwrap().clone(),
            })
            .await
            .unwrap();
        accepted.get_shareable_bundle().await.unwrap();
        let (_, ticket, _) = net.issuer.announced_tickets().pop().unwrap();

        alice.service.pause_contact_sharing(&chat_id).await.unwrap();
        let err = alice
            .service
            .accept_contact_port_ticket(&port_id, ticket.clone(), &chat_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Capacity { .. }));

        alice.service.resume_contact_sharing(&chat_id).await.unwrap();
        alice
            .service
            .accept_contact_port_ticket(&port_id, ticket, &chat_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ticket_from_another_contact_is_refused() {
        let net = Network::new();
        let (alice, bob) = connected(&net).await;
        let carol = net.user("Carol");
        let (port_id, _) = reshared(&net, &alice, &bob).await;

        // Carol connects to Alice directly and tries to announce a ticket.
        let mut port = alice
            .service
            .try_create_port(CreatePortRequest::Direct {
                label: None,
                folder_id: None,
                permissions: None,
                expires_in: None,
            })
            .await
            .unwrap();
        let bundle = port.get_shareable_bundle().await.unwrap().to_json().unwrap();
        net.expect_line("L9", "PA");
        carol.scan(&bundle).await.unwrap();
        net.relay(&alice, "PC").await.unwrap();

        let carol_chat = alice.chat_with("PC").await.unwrap().chat_id;
        let err = alice
            .service
            .accept_contact_port_ticket(&port_id, "f".repeat(32), &carol_chat)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Verification(_)));
    }
}
