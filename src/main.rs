use clap::{Parser, Subcommand};
use layer_mint::collection::{CollectionStatus, CollectionStore, JsonCollectionStore};
use layer_mint::config::PipelineConfig;
use layer_mint::jobs::{JobContext, JobRunner};
use layer_mint::publish::DigestContentStore;
use layer_mint::queue::JobQueue;
use layer_mint::service::{CollectionService, GenerationLimits};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "layer-mint")]
#[command(about = "Generative NFT collection pipeline")]
#[command(long_about = "\
Generative NFT collection pipeline

Your filesystem is the input. Layer directories become compositing slots,
rarity-suffixed images become weighted options, and the pipeline composites
them into numbered editions with metadata, ready to publish.

Data layout (under --base-dir/data by default):

  data/
  ├── layers/                  # Generation input, one directory per layer
  │   ├── 01_background/       # Drawn first (bottom)
  │   │   ├── plain_b.png      # _b = basic, _l = low, _m = medium
  │   │   └── sunset_r.png     # _r = rare, _sr = super rare
  │   └── 02_hat/              # Drawn last (top)
  ├── uploads/                 # Pre-composited raw images for 'upload'
  ├── nfts/                    # Generation scratch (emptied after each run)
  └── public/
      └── {collectionId}/      # Staged {n}.png + {n}.json pairs

Typical run:

  layer-mint create --name \"Moon Apes\" --owner 0xabc...
  layer-mint generate <id> --size 100
  layer-mint sync <id> --remove 3,7
  layer-mint status <id>

Run 'layer-mint gen-config' to generate a documented layer-mint.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = "layer-mint.toml", global = true)]
    config: PathBuf,

    /// Directory the data layout is resolved under
    #[arg(long, default_value = ".", global = true)]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a new, empty collection
    Create {
        /// Display name, used in published edition names
        #[arg(long)]
        name: String,
        /// Owner address
        #[arg(long)]
        owner: String,
    },
    /// Composite editions from the uploaded layers
    Generate {
        collection_id: String,
        /// Number of editions to composite
        #[arg(long)]
        size: u32,
    },
    /// Number and stage raw images from the uploads directory
    Upload { collection_id: String },
    /// Compact staged editions and publish them to content storage
    Sync {
        collection_id: String,
        /// Edition numbers to drop before publishing
        #[arg(long, value_delimiter = ',')]
        remove: Vec<u32>,
    },
    /// Show one collection record
    Status { collection_id: String },
    /// Write a collection status directly (e.g. DEPLOYED after minting)
    SetStatus {
        collection_id: String,
        status: CollectionStatus,
    },
    /// Record the deployed contract address
    SetContract {
        collection_id: String,
        address: String,
    },
    /// List collection records
    List {
        /// Only collections in this status
        #[arg(long)]
        status: Option<CollectionStatus>,
        /// Only collections owned by this address
        #[arg(long)]
        owner: Option<String>,
    },
    /// Delete a collection record and its staged artifacts
    Remove { collection_id: String },
    /// Print a stock layer-mint.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", layer_mint::config::stock_config_toml());
        return Ok(());
    }

    let config = PipelineConfig::load(&cli.config)?;
    let roots = config.roots(&cli.base_dir);
    let canvas = config.canvas_size();

    let store = Arc::new(JsonCollectionStore::open(
        &cli.base_dir.join(&config.data_dir).join("collections.json"),
    )?);
    let ctx = JobContext {
        store: Arc::clone(&store) as Arc<dyn CollectionStore>,
        content: Arc::new(DigestContentStore),
        roots: roots.clone(),
        canvas,
    };
    let queue = JobQueue::start(JobRunner::new(ctx));
    let service = CollectionService::new(
        Arc::clone(&store) as Arc<dyn CollectionStore>,
        queue.handle(),
        roots.clone(),
        canvas,
        GenerationLimits {
            min_layers: config.generation.min_layers,
            min_options: config.generation.min_options,
        },
    );

    match cli.command {
        Command::Create { name, owner } => {
            let id = service.create(&name, &owner)?;
            println!("==> Created collection {id}");
        }
        Command::Generate {
            collection_id,
            size,
        } => {
            println!("==> Generating {size} editions for {collection_id}");
            service.request_generation(&collection_id, size)?;
            queue.wait_idle();
            print_record(&service, &collection_id)?;
        }
        Command::Upload { collection_id } => {
            let count = count_uploads(&roots.uploads)?;
            println!("==> Uploading {count} raw images for {collection_id}");
            service.request_raw_upload(&collection_id, count)?;
            queue.wait_idle();
            print_record(&service, &collection_id)?;
        }
        Command::Sync {
            collection_id,
            remove,
        } => {
            println!("==> Publishing {collection_id} to content storage");
            service.request_sync(&collection_id, remove)?;
            queue.wait_idle();
            print_record(&service, &collection_id)?;
        }
        Command::Status { collection_id } => {
            print_record(&service, &collection_id)?;
        }
        Command::SetStatus {
            collection_id,
            status,
        } => {
            service.set_status(&collection_id, status)?;
            print_record(&service, &collection_id)?;
        }
        Command::SetContract {
            collection_id,
            address,
        } => {
            service.set_contract_address(&collection_id, &address)?;
            print_record(&service, &collection_id)?;
        }
        Command::List { status, owner } => {
            let statuses: Vec<CollectionStatus> = status.into_iter().collect();
            let collections = service.find_all(&statuses, owner.as_deref())?;
            for c in &collections {
                println!("{}  {:<10}  {:>5}  {}", c.id, c.status, c.size, c.name);
            }
            println!("==> {} collection(s)", collections.len());
        }
        Command::Remove { collection_id } => {
            service.remove(&collection_id)?;
            queue.wait_idle();
            println!("==> Removed {collection_id}");
        }
        Command::GenConfig => unreachable!("handled above"),
    }

    Ok(())
}

/// Print one collection record: status, size, hashes if published.
fn print_record(
    service: &CollectionService,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let c = service.find_one(id)?;
    println!("{}  {}  ({} editions)  {}", c.id, c.status, c.size, c.name);
    if let Some(address) = &c.contract_address {
        println!("    contract: {address}");
    }
    if let (Some(images), Some(metadata)) = (&c.images_hash, &c.metadata_hash) {
        println!("    images:   ipfs://{images}");
        println!("    metadata: ipfs://{metadata}");
    }
    Ok(())
}

/// Count the visible files waiting in the uploads directory.
fn count_uploads(uploads: &std::path::Path) -> Result<u32, std::io::Error> {
    if !uploads.is_dir() {
        return Ok(0);
    }
    let mut count = 0;
    for entry in std::fs::read_dir(uploads)? {
        let entry = entry?;
        let hidden = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with('.'));
        if entry.path().is_file() && !hidden {
            count += 1;
        }
    }
    Ok(count)
}
