//! Print the CustomResourceDefinitions as a multi-document YAML stream
//!
//! Usage:
//!   cargo run --bin crdgen > config/crd/crds.yaml

use kube::CustomResourceExt;
use serverless_operator::crd::{Function, Serverless};

fn main() -> anyhow::Result<()> {
    let crds = [Function::crd(), Serverless::crd()];
    let mut documents = Vec::with_capacity(crds.len());
    for crd in &crds {
        documents.push(serde_yaml::to_string(crd)?);
    }
    print!("{}", documents.join("---\n"));
    Ok(())
}
