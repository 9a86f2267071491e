use clap::Subcommand;
use corelib::Network;
use tracing::info;

/// Subcommands the demo binary supports. Each is a straight-line script
/// over one freshly built [`Network`] — there is no persistence between
/// invocations, since the core itself has none.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Join extra nodes, store and look up a few values, print health.
    Demo {
        /// Additional node ids to join after the initial ring is seeded.
        #[arg(long, value_delimiter = ',', default_value = "")]
        join: Vec<u64>,
    },
    /// Store a value and print the key it was stored under.
    Put { value: String },
    /// Look up a previously stored value.
    Get { value: String },
    /// Join one node into the running ring.
    Join { id: u64 },
    /// Gracefully remove one node from the ring.
    Leave { id: u64 },
    /// Print the aggregate health report.
    Health,
    /// Print one node's state as JSON.
    Snapshot { id: u64 },
}

impl Command {
    pub fn execute(&self, network: &Network) -> anyhow::Result<()> {
        match self {
            Command::Demo { join } => run_demo(network, join),
            Command::Put { value } => {
                let key = network.put(value.as_bytes())?;
                println!("stored '{value}' under key {key}");
                Ok(())
            }
            Command::Get { value } => match network.get(value.as_bytes()) {
                Ok(found) => {
                    println!("found: {}", String::from_utf8_lossy(&found));
                    Ok(())
                }
                Err(err) => {
                    println!("not found: {err}");
                    Ok(())
                }
            },
            Command::Join { id } => {
                network.insert_node(*id)?;
                network.run_stabilization_round();
                println!("node {id} joined");
                Ok(())
            }
            Command::Leave { id } => {
                network.delete_node(*id)?;
                network.run_stabilization_round();
                println!("node {id} left");
                Ok(())
            }
            Command::Health => {
                print_health(network);
                Ok(())
            }
            Command::Snapshot { id } => {
                let snapshot = network.snapshot(*id)?;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                Ok(())
            }
        }
    }
}

fn run_demo(network: &Network, join: &[u64]) -> anyhow::Result<()> {
    for &id in join {
        network.insert_node(id)?;
        info!(id, "joined");
    }
    network.stabilize_to_quiescence(network.node_count() + network.ring_params().m as usize);

    let sample_data = [
        "document1.pdf",
        "image.jpg",
        "video.mp4",
        "music.mp3",
        "source_code.rs",
    ];
    for data in sample_data {
        let key = network.put(data.as_bytes())?;
        println!("stored '{data}' under key {key}");
    }
    for data in &sample_data[..3] {
        match network.get(data.as_bytes()) {
            Ok(found) => println!("found '{data}': {}", String::from_utf8_lossy(&found)),
            Err(err) => println!("'{data}' not found: {err}"),
        }
    }
    match network.get(b"nonexistent_file.txt") {
        Ok(_) => unreachable!("this key was never stored"),
        Err(err) => println!("'nonexistent_file.txt' not found: {err}"),
    }

    println!("\nnetwork now has {} nodes", network.node_count());
    print_health(network);
    Ok(())
}

fn print_health(network: &Network) {
    let report = network.health_check();
    println!("healthy: {}", report.is_healthy());
    for (check, ok) in &report.checks {
        println!("  {check}: {ok}");
    }
    for (detail, value) in &report.details {
        println!("  {detail}: {value}");
    }
}
