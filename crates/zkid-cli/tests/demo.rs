//! The demo flow against in-memory backends.

use zkid_cli::config::ZkidConfig;
use zkid_cli::demo::{demo, DemoArgs};
use zkid_cli::identity::{identity_options, parse_seed};
use zkid_core::DidMethod;

fn args(birthday: u64) -> DemoArgs {
    DemoArgs {
        remote_rhs: false,
        message: "sign in".into(),
        birthday,
    }
}

#[tokio::test]
async fn demo_authenticates_and_proves_age() {
    let config = ZkidConfig::defaults().unwrap();
    let report = demo(&args(19960424), &config).await.unwrap();
    assert_eq!(report.proofs, 2);
    assert!(report.user.starts_with("did:polygonid:polygon:amoy:"));
    assert_ne!(report.user, report.issuer);
    assert!(report.envelope_len > 0);
}

#[tokio::test]
async fn demo_fails_when_the_predicate_does_not_hold() {
    let config = ZkidConfig::defaults().unwrap();
    assert!(demo(&args(20050101), &config).await.is_err());
}

#[tokio::test]
async fn demo_reads_artifacts_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    for circuit in zkid_zkp::CircuitId::ALL {
        zkid_zkp::write_circuit_data(dir.path(), &zkid_zkp::mock_setup(circuit))
            .await
            .unwrap();
    }
    let mut config = ZkidConfig::defaults().unwrap();
    config.circuits_path = Some(dir.path().to_path_buf());
    assert_eq!(demo(&args(19960424), &config).await.unwrap().proofs, 2);

    // An empty directory has no artifacts.
    config.circuits_path = Some(tempfile::tempdir().unwrap().path().to_path_buf());
    assert!(demo(&args(19960424), &config).await.is_err());
}

#[test]
fn seeded_identities_are_deterministic() {
    let config = ZkidConfig::defaults().unwrap();
    let seed = parse_seed(&"07".repeat(32)).unwrap();
    let did = |_: ()| {
        let store = zkid_identity::IdentityStore::new(
            std::sync::Arc::new(zkid_crypto::Kms::in_memory()),
            zkid_identity::TreeConfig::default(),
        );
        store
            .create_identity(identity_options(&config, DidMethod::PolygonId, Some(seed)).unwrap())
            .unwrap()
            .0
    };
    assert_eq!(did(()), did(()));
}
