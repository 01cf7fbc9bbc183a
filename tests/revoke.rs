//! Revocation of derived tokens at lease end.

mod common;

use common::{Call, Failure, Harness};
use glsecrets::models::LeasedSecret;
use glsecrets::{Error, Request, RevokeOutcome};
use serde_json::json;

mod dispatch {
    use super::*;

    #[tokio::test]
    async fn test_each_token_type_reaches_its_endpoint() {
        let cases = vec![
            (
                json!({"token_id": 11, "token_type": "personal"}),
                Call::RevokePersonal(11),
            ),
            (
                json!({"token_id": 12, "token_type": "project", "parent_id": "123"}),
                Call::RevokeProject(12, "123".into()),
            ),
            (
                json!({"token_id": "13", "token_type": "group", "parent_id": "acme/platform"}),
                Call::RevokeGroup(13, "acme/platform".into()),
            ),
            (
                json!({"token_id": 14, "token_type": "user_service_account", "token": "glpat-usa"}),
                Call::RevokeUserServiceAccount("glpat-usa".into()),
            ),
            (
                json!({"token_id": 15, "token_type": "group_service_account", "token": "glpat-gsa"}),
                Call::RevokeGroupServiceAccount("glpat-gsa".into()),
            ),
        ];

        for (data, expected) in cases {
            let h = Harness::new();
            h.seed("default", None, false).await;
            let outcome = h.backend.revoke(&h.revoke_req(data)).await.unwrap();
            assert_eq!(outcome, RevokeOutcome::Revoked);
            assert_eq!(h.platform.calls(), vec![expected]);
            assert_eq!(h.events.names(), vec!["token-revoke"]);
        }
    }

    #[tokio::test]
    async fn test_named_configuration_is_used() {
        let h = Harness::new();
        h.seed("other", None, false).await;
        let outcome = h
            .backend
            .revoke(&h.revoke_req(json!({
                "config_name": "other",
                "token_id": 5,
                "token_type": "personal",
            })))
            .await
            .unwrap();
        assert_eq!(outcome, RevokeOutcome::Revoked);
        assert!(h.backend.clients().contains("other"));
    }

    #[tokio::test]
    async fn test_unknown_configuration_is_not_configured() {
        let h = Harness::new();
        let err = h
            .backend
            .revoke(&h.revoke_req(json!({"token_id": 5, "token_type": "personal"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured));
        assert!(h.events.events().is_empty());
        assert!(h.platform.calls().is_empty());
        assert_eq!(h.backend.metrics().revocations("personal", "error"), 1);
        assert_eq!(h.backend.metrics().revocations("personal", "revoked"), 0);
    }
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn test_group_token_with_string_flag() {
        let h = Harness::new();
        h.seed("default", None, false).await;
        h.backend
            .revoke(&h.revoke_req(json!({
                "token_type": "group",
                "token_id": 42,
                "parent_id": "grp-7",
                "gitlab_revokes_token": "false",
            })))
            .await
            .unwrap();
        assert_eq!(h.platform.calls(), vec![Call::RevokeGroup(42, "grp-7".into())]);
    }

    #[tokio::test]
    async fn test_user_service_account_revoked_by_value_only() {
        let h = Harness::new();
        h.seed("default", None, false).await;
        let outcome = h
            .backend
            .revoke(&h.revoke_req(json!({
                "token_type": "user_service_account",
                "token": "glpat-xyz",
                "gitlab_revokes_token": "false",
            })))
            .await
            .unwrap();
        assert_eq!(outcome, RevokeOutcome::Revoked);
        assert_eq!(
            h.platform.calls(),
            vec![Call::RevokeUserServiceAccount("glpat-xyz".into())]
        );
        let events = h.events.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].attr("token_id"), Some(""));
        assert_eq!(events[0].attr("token_type"), Some("user_service_account"));
    }
}

mod outcomes {
    use super::*;

    #[tokio::test]
    async fn test_platform_managed_token_makes_no_remote_call() {
        let h = Harness::new();
        // No configuration at all: nothing should need one.
        let outcome = h
            .backend
            .revoke(&h.revoke_req(json!({
                "token_id": 7,
                "token_type": "project",
                "parent_id": "9",
                "gitlab_revokes_token": true,
                "name": "ci-token",
                "path": "role/ci",
            })))
            .await
            .unwrap();

        assert_eq!(outcome, RevokeOutcome::LeftToExpire);
        assert!(h.platform.calls().is_empty());
        assert_eq!(h.factory.builds(), 0);

        let events = h.events.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.name, "token-revoke");
        assert_eq!(event.attr("lease_id"), Some("lease-1"));
        assert_eq!(event.attr("path"), Some("role/ci"));
        assert_eq!(event.attr("name"), Some("ci-token"));
        assert_eq!(event.attr("token_id"), Some("7"));
        assert_eq!(event.attr("token_type"), Some("project"));
        assert_eq!(event.attr("gitlab_revokes_token"), Some("true"));
        assert_eq!(h.backend.metrics().revocations("project", "skipped"), 1);
    }

    #[tokio::test]
    async fn test_already_gone_is_success() {
        let h = Harness::new();
        h.seed("default", None, false).await;
        h.platform.fail_revoke(Failure::NotFound);

        let outcome = h
            .backend
            .revoke(&h.revoke_req(json!({"token_id": 3, "token_type": "group", "parent_id": "4"})))
            .await
            .unwrap();
        assert_eq!(outcome, RevokeOutcome::AlreadyGone);
        assert_eq!(h.events.names(), vec!["token-revoke"]);
        assert_eq!(h.events.events()[0].attr("gitlab_revokes_token"), Some("false"));
        assert_eq!(h.backend.metrics().revocations("group", "already_gone"), 1);
    }

    #[tokio::test]
    async fn test_revoking_twice_is_idempotent() {
        let h = Harness::new();
        h.seed("default", None, false).await;
        let data = json!({"token_id": 3, "token_type": "personal"});

        h.backend.revoke(&h.revoke_req(data.clone())).await.unwrap();
        h.platform.fail_revoke(Failure::NotFound);
        h.backend.revoke(&h.revoke_req(data)).await.unwrap();
        assert_eq!(h.events.names(), vec!["token-revoke", "token-revoke"]);
    }

    #[tokio::test]
    async fn test_remote_failure_aborts_without_event() {
        let h = Harness::new();
        h.seed("default", None, false).await;
        h.platform.fail_revoke(Failure::Remote);

        let err = h
            .backend
            .revoke(&h.revoke_req(json!({"token_id": 3, "token_type": "personal"})))
            .await
            .unwrap_err();
        match err {
            Error::Remote { operation, .. } => {
                assert!(operation.starts_with("revoke token 3 (personal) of default"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(h.events.events().is_empty());
        assert_eq!(h.backend.metrics().revocations("personal", "error"), 1);
    }

    #[tokio::test]
    async fn test_due_administrative_token_is_rotated_first() {
        let h = Harness::new();
        h.seed("default", Some(chrono::Duration::hours(3)), true).await;

        h.backend
            .revoke(&h.revoke_req(json!({"token_id": 8, "token_type": "personal"})))
            .await
            .unwrap();

        assert_eq!(h.platform.calls(), vec![Call::Rotate, Call::RevokePersonal(8)]);
        assert_eq!(
            h.platform.built_with(),
            vec!["glpat-admin-original", "glpat-rotated-1"]
        );
        assert_eq!(
            h.events.names(),
            vec!["config-token-rotate", "token-revoke"]
        );
    }

    #[tokio::test]
    async fn test_failed_pre_rotation_does_not_block_revoke() {
        let h = Harness::new();
        h.seed("default", Some(chrono::Duration::hours(3)), true).await;
        h.platform.fail_rotate(Failure::Remote);

        let outcome = h
            .backend
            .revoke(&h.revoke_req(json!({"token_id": 8, "token_type": "personal"})))
            .await
            .unwrap();
        assert_eq!(outcome, RevokeOutcome::Revoked);
        assert_eq!(h.platform.calls(), vec![Call::Rotate, Call::RevokePersonal(8)]);
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn test_missing_storage() {
        let h = Harness::new();
        let req = Request::default().with_secret(common::lease(json!({"token_id": 1})));
        let err = h.backend.revoke(&req).await.unwrap_err();
        assert!(matches!(err, Error::MissingDependency("storage")));
    }

    #[tokio::test]
    async fn test_missing_secret_touches_nothing() {
        let h = Harness::new();
        let err = h.backend.revoke(&h.req()).await.unwrap_err();
        assert!(matches!(err, Error::MissingDependency("secret")));
        assert_eq!(h.storage.accesses(), 0);
    }

    #[tokio::test]
    async fn test_bad_token_id_rejected_before_storage() {
        let h = Harness::new();
        for data in [
            json!({"token_type": "personal"}),
            json!({"token_id": "abc", "token_type": "personal"}),
        ] {
            let err = h.backend.revoke(&h.revoke_req(data)).await.unwrap_err();
            assert!(matches!(err, Error::InvalidValue { ref field, .. } if field == "token_id"));
        }
        assert_eq!(h.storage.accesses(), 0);
        assert!(h.platform.calls().is_empty());
        assert!(h.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_token_type() {
        let h = Harness::new();
        let err = h
            .backend
            .revoke(&h.revoke_req(json!({"token_id": 1, "token_type": "deploy"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { ref field, .. } if field == "token_type"));
    }

    #[tokio::test]
    async fn test_parent_required_for_project_and_group() {
        let h = Harness::new();
        h.seed("default", None, false).await;
        for token_type in ["project", "group"] {
            let err = h
                .backend
                .revoke(&h.revoke_req(json!({"token_id": 1, "token_type": token_type})))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidValue { ref field, .. } if field == "parent_id"));
        }
        assert!(h.platform.calls().is_empty());
        assert!(h.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_lease_metadata() {
        let h = Harness::new();
        let req = h.req().with_secret(LeasedSecret::default());
        assert!(matches!(
            h.backend.revoke(&req).await,
            Err(Error::InvalidValue { .. })
        ));
    }
}
