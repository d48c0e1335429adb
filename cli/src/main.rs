mod session;

use std::env;

use serde_json::json;
use shroud_config::ShroudConfig;
use shroud_keypair::Keypair;

use session::Output;

/// Environment variable holding the signing key for `execute`
const PRIVATE_KEY_ENV: &str = "SHROUD_PRIVATE_KEY";

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let cmd = &args[1];

    match cmd.as_str() {
        "genkey" => {
            if let Err(e) = genkey() {
                eprintln!("❌ Error generating key: {}", e);
                std::process::exit(1);
            }
        }
        "address" => {
            let Some(private_key) = args.get(2) else {
                println!("Usage: address <private-key>");
                return;
            };
            match Keypair::from_private_key(private_key) {
                Ok(key) => println!("{}", key.address()),
                Err(e) => {
                    eprintln!("❌ Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        "execute" => {
            let Some(opts) = parse_execute_args(&args[2..]) else {
                println!("Usage: execute [--track] [--json] <function> <fee> <input>...");
                println!("  function - Program function, e.g. mint_tokens");
                println!("  fee      - Fee in credits, e.g. 0.1");
                println!("  input    - Typed literal, e.g. 100u64 or aleo1...");
                println!();
                println!("The signing key is read from {}.", PRIVATE_KEY_ENV);
                return;
            };
            match execute(opts).await {
                Ok(true) => {}
                Ok(false) => std::process::exit(1),
                Err(e) => {
                    eprintln!("❌ Error executing transaction: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        "track" => {
            let output = output_flag(&args[2..]);
            let Some(id) = args[2..].iter().find(|a| !a.starts_with("--")) else {
                println!("Usage: track [--json] <transaction-id>");
                return;
            };
            match track(id, output).await {
                Ok(true) => {}
                Ok(false) => std::process::exit(1),
                Err(e) => {
                    eprintln!("❌ Error tracking transaction: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        "config" => {
            print!("{}", ShroudConfig::generate_sample());
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        _ => {
            println!("❌ Unknown command: {}", cmd);
            println!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Shroud CLI - private program calls from the command line");
    println!();
    println!("USAGE:");
    println!("  shroud <command> [args]");
    println!();
    println!("ACCOUNT COMMANDS:");
    println!("  genkey                          Generate a new account");
    println!("  address <private-key>           Derive the address of a private key");
    println!();
    println!("TRANSACTION COMMANDS:");
    println!("  execute <function> <fee> <input>...");
    println!("                                  Sign and broadcast a program call");
    println!("  track <transaction-id>          Poll a transaction until it settles");
    println!();
    println!("OTHER COMMANDS:");
    println!("  config                          Print a sample config.toml");
    println!("  help                            Show this help message");
    println!();
    println!("OPTIONS:");
    println!("  --track                         (execute) keep polling after broadcast");
    println!("  --json                          Print raw worker messages");
    println!();
    println!("EXAMPLES:");
    println!("  shroud genkey");
    println!("  SHROUD_PRIVATE_KEY=APrivateKey1... shroud execute donate 0.1 5u64");
    println!("  shroud track at1...");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("  SHROUD_PRIVATE_KEY   Signing key for execute");
    println!("  SHROUD_CONFIG        Path to config.toml");
    println!("  SHROUD_GATEWAY_URL   Ledger gateway base URL");
    println!("  RUST_LOG             Log level (debug/info/warn/error)");
}

#[derive(Debug, PartialEq)]
struct ExecuteOpts {
    function_name: String,
    fee: String,
    inputs: Vec<String>,
    track: bool,
    output: Output,
}

fn parse_execute_args(args: &[String]) -> Option<ExecuteOpts> {
    let mut track = false;
    let mut positional = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--track" => track = true,
            "--json" => {}
            _ => positional.push(arg.clone()),
        }
    }

    if positional.len() < 3 {
        return None;
    }
    let inputs = positional.split_off(2);
    let fee = positional.pop()?;
    let function_name = positional.pop()?;

    Some(ExecuteOpts {
        function_name,
        fee,
        inputs,
        track,
        output: output_flag(args),
    })
}

fn output_flag(args: &[String]) -> Output {
    if args.iter().any(|a| a == "--json") {
        Output::Json
    } else {
        Output::Human
    }
}

fn genkey() -> anyhow::Result<()> {
    println!("🔐 Generating new account...");
    let key = Keypair::generate()?;

    println!("🔑 Private key: {}", key.private_key().as_str());
    println!("👁  View key:    {}", key.view_key().as_str());
    println!("📬 Address:     {}", key.address());
    println!();
    println!("⚠️  Store the private key safely; it is not saved anywhere.");
    Ok(())
}

async fn execute(opts: ExecuteOpts) -> anyhow::Result<bool> {
    let private_key = env::var(PRIVATE_KEY_ENV)
        .map_err(|_| anyhow::anyhow!("{} is not set", PRIVATE_KEY_ENV))?;

    let mut config = ShroudConfig::load()?;
    config.worker.track_after_broadcast = opts.track;

    let request = json!({
        "type": "execute_transaction",
        "payload": {
            "privateKeyString": private_key,
            "functionName": opts.function_name,
            "inputs": opts.inputs,
            "fee": opts.fee,
        }
    });

    let done = if opts.track {
        session::tracking_done
    } else {
        session::broadcast_done
    };
    session::run(config, request, done, opts.output).await
}

async fn track(id: &str, output: Output) -> anyhow::Result<bool> {
    let config = ShroudConfig::load()?;
    let request = json!({
        "type": "track_transaction",
        "payload": { "transactionId": id }
    });
    session::run(config, request, session::tracking_done, output).await
}
