// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod serve;

use clap::{Parser, Subcommand, ValueEnum};
use opc_oidc::constants::{ACTIONS_ID_TOKEN_REQUEST_TOKEN, ACTIONS_ID_TOKEN_REQUEST_URL};
use opc_oidc::workload_identity::{Exchanger, WorkloadIdentityRequest};
use std::net::SocketAddr;

const DESCRIPTION: &str = concat!(
    "Mints Google Cloud ID tokens from a CI job using workload identity federation. ",
    "The CI token endpoint and its bearer token are read from the ",
    "ACTIONS_ID_TOKEN_REQUEST_URL and ACTIONS_ID_TOKEN_REQUEST_TOKEN environment ",
    "variables unless given as flags. The `proxy` command forwards requests to a ",
    "single upstream, authenticating them with the default credentials."
);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    enable_tracing(&args)?;
    tracing::debug!("configuration: {args:?}");

    match args.command {
        Command::FederationToken(ci) => {
            let token = Exchanger::builder()
                .build()
                .federation_token(&ci.request_url, &ci.request_token, &ci.provider)
                .await?;
            println!("{token}");
        }
        Command::IdToken(id) => {
            let token = Exchanger::builder().build().exchange(&id.request()).await?;
            println!("{token}");
        }
        Command::Proxy(proxy) => {
            let reverse_proxy = opc_oidc::proxy::new_proxy(&proxy.target).await?;
            let listener = tokio::net::TcpListener::bind(proxy.listen).await?;
            tracing::info!(
                listen = %listener.local_addr()?,
                target = %reverse_proxy.target(),
                "serving reverse proxy"
            );
            serve::run(listener, reverse_proxy, serve::shutdown_signal()).await?;
        }
    }
    Ok(())
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = DESCRIPTION)]
struct Args {
    /// The most verbose level written to stderr.
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Print the federation token issued by the CI platform.
    FederationToken(CiArgs),
    /// Exchange the federation token and print an ID token.
    IdToken(IdTokenArgs),
    /// Serve a reverse proxy that attaches ID tokens to each request.
    Proxy(ProxyArgs),
}

#[derive(Clone, clap::Args)]
struct CiArgs {
    /// The workload identity provider, as
    /// `projects/<number>/locations/global/workloadIdentityPools/<pool>/providers/<provider>`.
    #[arg(long)]
    provider: String,

    #[arg(long, env = ACTIONS_ID_TOKEN_REQUEST_URL, hide_env_values = true)]
    request_url: String,

    #[arg(long, env = ACTIONS_ID_TOKEN_REQUEST_TOKEN, hide_env_values = true)]
    request_token: String,
}

impl std::fmt::Debug for CiArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CiArgs")
            .field("provider", &self.provider)
            .field("request_url", &self.request_url)
            .field("request_token", &"[censored]")
            .finish()
    }
}

#[derive(Clone, Debug, clap::Args)]
struct IdTokenArgs {
    #[command(flatten)]
    ci: CiArgs,

    /// The service account to impersonate.
    #[arg(long)]
    service_account: String,

    /// The audience of the ID token, typically the URL of the service.
    #[arg(long)]
    audience: String,
}

impl IdTokenArgs {
    fn request(&self) -> WorkloadIdentityRequest {
        WorkloadIdentityRequest {
            ci_token_request_url: self.ci.request_url.clone(),
            ci_token_request_token: self.ci.request_token.clone(),
            workload_identity_provider: self.ci.provider.clone(),
            service_account: self.service_account.clone(),
            target_audience: self.audience.clone(),
        }
    }
}

#[derive(Clone, Debug, clap::Args)]
struct ProxyArgs {
    /// The upstream URL, its path and query prefix every forwarded request.
    #[arg(long)]
    target: String,

    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
}

fn enable_tracing(args: &Args) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_level(true)
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr);
    match args.log_format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    };
    Ok(())
}
