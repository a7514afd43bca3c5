use std::sync::Arc;

use clap::Parser;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use autocrane_operator::args::Args;
use autocrane_operator::clock::SystemClock;
use autocrane_operator::config::Config;
use autocrane_operator::k8s::{
    annotations::KubePodAnnotationPutter, evict::KubePodEvicter, gc::KubeExpiredObjectDeleter,
    known_good::KubeKnownGoodAccessor, latest::KubeLatestVersionAccessor, leader::KubeLeaderElection,
    manifest::ConfigMapManifestFetcher, requests::KubePodDataRequestGetter, watchdog::KubeFailingPodGetter,
};
use autocrane_operator::orchestrator::Orchestrator;
use autocrane_operator::util::shutdown::shutdown_signal;

#[tokio::main]
async fn main() {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let args = Args::parse();
    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format!("configuration error: {e}").red());
            std::process::exit(3);
        }
    };

    let client = match kube::Client::try_default().await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", format!("failed to build Kubernetes client: {e}").red());
            std::process::exit(3);
        }
    };

    let holder_id = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("autocrane-{}", uuid::Uuid::new_v4()));

    let manifest_fetcher = Arc::new(ConfigMapManifestFetcher::new(
        client.clone(),
        config.manifest_namespace.clone(),
        config.manifest_configmap.clone(),
    ));
    let orchestrator = Orchestrator::new(
        config.clone(),
        Arc::new(SystemClock),
        manifest_fetcher,
        Arc::new(KubePodDataRequestGetter::new(client.clone())),
        Arc::new(KubeKnownGoodAccessor::new(client.clone())),
        Arc::new(KubeLatestVersionAccessor::new(client.clone())),
        Arc::new(KubeFailingPodGetter::new(client.clone())),
        Arc::new(KubePodAnnotationPutter::new(client.clone())),
        Arc::new(KubePodEvicter::new(client.clone())),
        Arc::new(KubeExpiredObjectDeleter::new(client.clone())),
        Arc::new(KubeLeaderElection::new(
            client,
            config.lease_namespace.clone(),
            holder_id,
            config.lease_ttl,
        )),
    );

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_cancel.cancel();
    });

    println!("{}", "starting AutoCrane orchestrator".green());
    let exit_code = orchestrator.run(cancel).await;
    std::process::exit(exit_code);
}
