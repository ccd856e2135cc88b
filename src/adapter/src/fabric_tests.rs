#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;

    use crate::contract::memory::MemoryContract;
    use crate::contract::{ContractClient, FabricConnection};
    use crate::fabric::{FabricAdapter, FabricAdapterConfig, DEPLOY_SCRIPT};
    use crate::BcAdapter;
    use common::prelude::*;
    use common::testutil::{init, ScriptedRunner};
    use tempfile::{tempdir, TempDir};

    struct Setup {
        dir: TempDir,
        config: PathBuf,
        network: String,
        runner: Arc<ScriptedRunner>,
        contract: MemoryContract,
    }

    fn network_json(test_network: &str) -> String {
        let mut network = NetworkConfig::new("db");
        network.set("channel_name", "db-0b6c1e6e");
        network.set("msp_id", "Org1MSP");
        network.set("cert_path", "/net/users/User1/msp/signcerts/cert.pem");
        network.set("key_path", "/net/users/User1/msp/keystore/");
        network.set("tls_cert_path", "/net/peers/peer0/tls/ca.crt");
        network.set("gateway_peer", "peer0");
        network.set("peer_endpoint", "localhost:7051");
        network.set("test_network_path", test_network);
        network.to_json()
    }

    fn setup() -> Setup {
        init();
        let dir = tempdir().unwrap();
        let config = dir.path().join("adapter.ini");
        fs::write(
            &config,
            "[Adapter-Fabric]\nadapters-path = /opt/adapters\n",
        )
        .unwrap();
        let network = network_json(&dir.path().to_string_lossy());
        Setup {
            dir,
            config,
            network,
            runner: Arc::new(ScriptedRunner::strict()),
            contract: MemoryContract::default(),
        }
    }

    fn adapter(s: &Setup) -> FabricAdapter {
        let contract = s.contract.clone();
        let mut adapter = FabricAdapter::new(s.runner.clone())
            .with_client_factory(Box::new(
                move |_: &FabricConnection| -> Box<dyn ContractClient> { Box::new(contract.clone()) },
            ));
        adapter.init_with_network(&s.config, &s.network).unwrap();
        adapter
    }

    fn b(s: &str) -> Bytes {
        Bytes::from(s)
    }

    #[test]
    fn test_create_table_deploys_contract() {
        let s = setup();
        s.runner.respond(DEPLOY_SCRIPT, ExecOutput::ok(""));
        let mut adapter = adapter(&s);
        assert_eq!(adapter.create_table("t").unwrap(), "74");
        let deploy = s.runner.find(DEPLOY_SCRIPT).unwrap();
        assert_eq!(
            deploy,
            format!(
                "bash '/opt/adapters/fabric/scripts/deployContract.sh' 'db-0b6c1e6e' 'db-0b6c1e6e' \
                 'localhost:7051' '{}' '/opt/adapters'",
                s.dir.path().display()
            )
        );
    }

    #[test]
    fn test_failed_deploy_leaves_no_table() {
        let s = setup();
        s.runner
            .respond(DEPLOY_SCRIPT, ExecOutput::failed("chaincode install failed"));
        let mut adapter = adapter(&s);
        assert!(matches!(
            adapter.create_table("t"),
            Err(ChainError::CommandFailed(_))
        ));
        assert!(matches!(
            adapter.get_all(),
            Err(ChainError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_put_get_remove() {
        let s = setup();
        s.runner.respond(DEPLOY_SCRIPT, ExecOutput::ok(""));
        let mut adapter = adapter(&s);
        adapter.create_table("t").unwrap();

        let mut batch: Batch = [(b("AAAA"), b("1111")), (b("k"), b("v"))]
            .into_iter()
            .collect();
        adapter.put(&mut batch).unwrap();
        assert!(batch.is_empty());
        assert_eq!(s.contract.entries("74")["41414141"], "31313131");
        assert_eq!(adapter.get(&b("AAAA")).unwrap(), b("1111"));
        assert_eq!(adapter.get_all().unwrap().len(), 2);

        adapter.remove(&b("k")).unwrap();
        assert!(matches!(adapter.get(&b("k")), Err(ChainError::NotFound(_))));
        assert!(matches!(adapter.remove(&b("k")), Err(ChainError::NotFound(_))));
    }

    #[test]
    fn test_failed_put_keeps_batch() {
        let s = setup();
        s.runner.respond(DEPLOY_SCRIPT, ExecOutput::ok(""));
        let mut adapter = adapter(&s);
        adapter.create_table("t").unwrap();
        s.contract.set_offline(true);
        let mut batch: Batch = [(b("k"), b("v"))].into_iter().collect();
        assert!(adapter.put(&mut batch).is_err());
        assert_eq!(batch.len(), 1);

        s.contract.set_offline(false);
        adapter.put(&mut batch).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_remove_batch_is_all_or_nothing() {
        let s = setup();
        s.runner.respond(DEPLOY_SCRIPT, ExecOutput::ok(""));
        let mut adapter = adapter(&s);
        adapter.create_table("t").unwrap();
        let mut batch: Batch = [(b("a"), b("1")), (b("b"), b("2"))].into_iter().collect();
        adapter.put(&mut batch).unwrap();

        assert!(matches!(
            adapter.remove_batch(&[b("a"), b("zz")]),
            Err(ChainError::NotFound(_))
        ));
        assert_eq!(adapter.get_all().unwrap().len(), 2);
        adapter.remove_batch(&[b("a"), b("b")]).unwrap();
        assert!(adapter.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_drop_table_empties_it() {
        let s = setup();
        s.runner.respond(DEPLOY_SCRIPT, ExecOutput::ok(""));
        let mut adapter = adapter(&s);
        adapter.create_table("t").unwrap();
        adapter.drop_table().unwrap();
        let mut batch: Batch = [(b("a"), b("1")), (b("b"), b("2"))].into_iter().collect();
        adapter.put(&mut batch).unwrap();
        adapter.drop_table().unwrap();
        assert!(adapter.get_all().unwrap().is_empty());
        assert!(s.contract.entries("74").is_empty());
    }

    #[test]
    fn test_init_requires_test_network() {
        let s = setup();
        let mut adapter = FabricAdapter::new(s.runner.clone());
        let missing = network_json("/definitely/not/here");
        assert!(matches!(
            adapter.init_with_network(&s.config, &missing),
            Err(ChainError::ConfigError(_))
        ));
        let incomplete = NetworkConfig::new("db").to_json();
        assert!(adapter.init_with_network(&s.config, &incomplete).is_err());
    }

    #[test]
    fn test_connection_from_config() {
        let s = setup();
        let mut config = FabricAdapterConfig::from_config_file(&s.config).unwrap();
        config
            .set_network_config(&NetworkConfig::from_json(&s.network).unwrap())
            .unwrap();
        let conn = config.connection().unwrap();
        assert_eq!(conn.channel, "db-0b6c1e6e");
        assert_eq!(conn.contract, conn.channel);
        assert_eq!(conn.msp_dir, PathBuf::from("/net/users/User1/msp"));
        assert_eq!(conn.orderer_endpoint, "localhost:7050");
        assert_eq!(conn.gateway_peer, "peer0");
    }
}
