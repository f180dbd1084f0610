//! Command line client for the ETO platform.
//!
//! Loads a configuration file, builds the platform and either keeps a
//! session alive (`run`) or performs a single operation against the node
//! and the authentication server.

use alloy::primitives::{Address, B256, U256};
use clap::{Parser, Subcommand, ValueEnum};
use eto_config::Config;
use eto_core::tx::flows::{UserClaimFlow, WithdrawFlow};
use eto_core::tx::{FlowOutcome, TxFlow};
use eto_core::Platform;
use eto_types::UserType;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod factory_registry;

/// Command-line arguments for the ETO client.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "ETO_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
	/// Restore the stored session and keep it alive until interrupted
	Run,
	/// Print the ether balance of an address, or of the personal wallet
	Balance {
		address: Option<Address>,
	},
	/// Sign in with the personal wallet
	Login {
		#[arg(long, value_enum, default_value_t = Role::Investor)]
		role: Role,
	},
	/// End the current session
	Logout,
	/// Send ether to another address
	Withdraw {
		to: Address,
		/// Amount in wei
		value: U256,
	},
	/// Claim tokens of a successful offering
	Claim {
		eto_id: Address,
	},
	/// Wait until a transaction is mined
	WatchTx {
		hash: B256,
	},
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Role {
	Investor,
	Issuer,
	Nominee,
}

impl From<Role> for UserType {
	fn from(role: Role) -> Self {
		match role {
			Role::Investor => UserType::Investor,
			Role::Issuer => UserType::Issuer,
			Role::Nominee => UserType::Nominee,
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Config path is not valid UTF-8: {}", args.config.display()))?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.platform.id);

	let platform = Arc::new(factory_registry::build_platform_from_config(config).await?);

	let cancel = CancellationToken::new();
	tokio::spawn({
		let cancel = cancel.clone();
		async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				tracing::info!("Interrupted");
				cancel.cancel();
			}
		}
	});

	execute(&platform, args.command, &cancel).await
}

async fn execute(
	platform: &Platform,
	command: Command,
	cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
	match command {
		Command::Run => {
			tracing::info!("Started session");
			platform.run(cancel.clone()).await?;
			tracing::info!("Stopped session");
		},
		Command::Balance { address } => {
			let address = match address {
				Some(address) => address,
				None => platform.wallets().personal_wallet().await?.address().await?,
			};
			let balance = platform.node().get_balance(address).await?;
			println!("{} {}", address.to_checksum(None), balance);
		},
		Command::Login { role } => {
			let permissions = &platform.config().auth.default_permissions;
			let user = platform.auth().login(role.into(), permissions).await?;
			println!("Logged in as {}", user.user_id.to_checksum(None));
		},
		Command::Logout => {
			platform.auth().logout().await?;
			println!("Logged out");
		},
		Command::Withdraw { to, value } => {
			send(platform, &WithdrawFlow { to, value }, cancel).await?;
		},
		Command::Claim { eto_id } => {
			send(platform, &UserClaimFlow { eto_id }, cancel).await?;
		},
		Command::WatchTx { hash } => {
			let tx = platform
				.node()
				.wait_for_tx(hash, cancel, |block| async move {
					tracing::debug!(block, "New block");
				})
				.await?;
			let block = tx.block_number.map(|b| b.to::<u64>()).unwrap_or_default();
			println!("{} mined in block {}", tx.hash, block);
		},
	}
	Ok(())
}

async fn send(
	platform: &Platform,
	flow: &dyn TxFlow,
	cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
	match platform.tx_sender().run(flow, cancel).await {
		FlowOutcome::Mined(tx) => {
			println!("{} {}", flow.kind(), tx.hash);
			Ok(())
		},
		FlowOutcome::Cancelled => {
			println!("{} cancelled", flow.kind());
			Ok(())
		},
		FlowOutcome::Failed(e) => Err(format!("{} failed: {} ({})", flow.kind(), e, e.category()).into()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use eto_types::StorageKey;
	use std::io::Write;

	#[test]
	fn test_args_defaults() {
		let args = Args::try_parse_from(["eto", "run"]).unwrap();

		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
		assert_eq!(args.command, Command::Run);
	}

	#[test]
	fn test_withdraw_arguments() {
		let args = Args::try_parse_from([
			"eto",
			"--config",
			"custom.toml",
			"withdraw",
			"0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
			"1000",
		])
		.unwrap();

		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(
			args.command,
			Command::Withdraw {
				to: "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap(),
				value: U256::from(1000),
			}
		);
	}

	#[test]
	fn test_invalid_address_is_rejected() {
		assert!(Args::try_parse_from(["eto", "claim", "not-an-address"]).is_err());
	}

	#[test]
	fn test_login_role() {
		let args = Args::try_parse_from(["eto", "login", "--role", "issuer"]).unwrap();

		assert_eq!(args.command, Command::Login { role: Role::Issuer });
		assert_eq!(UserType::from(Role::Issuer), UserType::Issuer);
	}

	#[tokio::test]
	async fn test_logout_with_file_config() {
		let dir = tempfile::tempdir().unwrap();
		let storage_path = dir.path().join("session");
		let config_path = dir.path().join("config.toml");
		let mut file = std::fs::File::create(&config_path).unwrap();
		write!(
			file,
			r#"
[platform]
id = "eto-cli-test"
chain_id = 17

[node]
rpc_url = "http://localhost:8545"

[auth]
base_url = "http://localhost:5000"

[storage]
primary = "file"
[storage.implementations.file]
storage_path = "{}"

[wallet]
primary = "local"
[wallet.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[contracts]
ether_token = "0x0000000000000000000000000000000000000001"
euro_token = "0x0000000000000000000000000000000000000002"
ether_lock = "0x0000000000000000000000000000000000000003"
euro_lock = "0x0000000000000000000000000000000000000004"
fee_disbursal = "0x0000000000000000000000000000000000000005"
platform_terms = "0x0000000000000000000000000000000000000006"
universe = "0x0000000000000000000000000000000000000007"
"#,
			storage_path.display()
		)
		.unwrap();

		let config = Config::from_file(config_path.to_str().unwrap()).await.unwrap();
		let platform = factory_registry::build_platform_from_config(config)
			.await
			.unwrap();
		platform.storage().set(StorageKey::Jwt, "token").await.unwrap();

		execute(&platform, Command::Logout, &CancellationToken::new())
			.await
			.unwrap();

		assert_eq!(platform.storage().get(StorageKey::Jwt).await.unwrap(), None);
		assert!(!platform.wallets().has_plugged_wallet().await);
	}
}
