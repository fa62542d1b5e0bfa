/*
 * Copyright 2021 Daniel Bornkessel
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::convert::TryFrom;
use std::process::exit;
use std::sync::Arc;

use anyhow::Context;
use clap::{crate_authors, crate_version, Parser};
use env_logger::Builder;
use kube::CustomResourceExt;
use log::{debug, info, LevelFilter};

use self_service_postgres_operator::config::{Config, PostgresArgs};
use self_service_postgres_operator::pg;
use self_service_postgres_operator::postgres::operator::PostgresOperator;
use self_service_postgres_operator::postgres::{Postgres, Sample};
use self_service_postgres_operator::postgres_user::operator::PostgresUserOperator;
use self_service_postgres_operator::postgres_user::PostgresUser;
use self_service_postgres_operator::store::KubeStore;

#[derive(Parser)]
#[command(version = crate_version!(), author = crate_authors!())]
struct Opts {
    /// Prints the postgres and postgres user crds to stdout
    #[arg(short = 'c', long)]
    print_crds: bool,

    /// Install the postgres and postgres user crds into the cluster
    #[arg(short = 'C', long)]
    install_crds: bool,

    /// Prints sample postgres and postgres user manifests
    #[arg(short = 'm', long)]
    print_sample_manifests: bool,

    /// verbose level
    #[arg(short, long, default_value = "info", value_parser = ["debug", "info", "warn", "error"])]
    verbosity_level: String,

    #[command(flatten)]
    postgres: PostgresArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts: Opts = Opts::parse();
    let mut builder = Builder::from_default_env();

    let level = match opts.verbosity_level.as_str() {
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => unreachable!(), // guarded by clap / getops config further up
    };

    builder
        .filter(Some("postgres_operator"), level)
        .filter(Some("self_service_postgres_operator"), level)
        .init();

    info!("starting postgres operator version {}", crate_version!());

    debug!("logging level set to 'debug' -- don't use this in production as it can potentially leak sensitive information");

    if opts.print_crds {
        println!(
            "# postgres crd (auto-generated):\n{}\n---\n# postgres user crd (auto-generated):\n{}\n",
            serde_yaml::to_string(&Postgres::crd())?,
            serde_yaml::to_string(&PostgresUser::crd())?
        );
        exit(0)
    }

    if opts.print_sample_manifests {
        println!(
            "# postgres sample manifest (auto-generated with 'postgres-operator --print-sample-manifests'):\n{}\n---\n# postgres user sample manifest:\n{}\n",
            serde_yaml::to_string(&Postgres::sample())?,
            serde_yaml::to_string(&PostgresUser::sample())?
        );
        exit(0)
    }

    let config = Arc::new(Config::try_from(opts.postgres)?);

    debug!("infering kubernetes config");
    let kubeconfig = kube::Config::infer().await?;

    let kube_client = kube::Client::try_from(kubeconfig)
        .context("error creating kubernetes client from the current environment")?;

    if opts.install_crds {
        info!("installing crds");
        self_service_postgres_operator::install_crd(&kube_client, &Postgres::crd()).await?;
        self_service_postgres_operator::install_crd(&kube_client, &PostgresUser::crd()).await?;
        return Ok(());
    }

    info!(
        "managing postgres on {} as {} (cloud provider: {}, instance: '{}')",
        config.host,
        config.user,
        config
            .cloud_provider
            .map(|p| p.to_string())
            .unwrap_or_else(|| "none".to_string()),
        config.instance_filter
    );
    let driver = pg::new_driver(&config).context("error setting up postgres connections")?;
    let store = Arc::new(KubeStore::new(kube_client));

    info!("starting operators");
    let postgres_operator =
        PostgresOperator::new(Arc::clone(&store), Arc::clone(&driver), Arc::clone(&config));
    let user_operator = PostgresUserOperator::new(store, driver, config);

    tokio::join!(postgres_operator.run(), user_operator.run());
    Ok(())
}
