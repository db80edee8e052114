//! Prints the bgplb CRDs as a multi-document YAML stream.
//!
//! `cargo run -p crds --bin crdgen > deploy/crds.yaml`

use crds::{BGPConfiguration, BGPIPsConfig};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let documents = [
        serde_yaml::to_string(&BGPConfiguration::crd())?,
        serde_yaml::to_string(&BGPIPsConfig::crd())?,
    ];
    print!("{}", documents.join("---\n"));
    Ok(())
}
