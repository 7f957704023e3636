use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use perm_cache::authz::{IdSet, PermKind, Perms, ProviderType, TracingFields};
use perm_cache::db::{self, store::sorted_ids, PermsStore};
use perm_cache::models::{Repo, UserPermissions};
use perm_cache::utils::{parse_id_list, utc_now};
use perm_cache::{Authorizer, PermsCache, PermsConfig, PermsSyncer, StaticProvider};

#[derive(Parser, Debug)]
#[command(author, version, about = "permissions cache tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    Migrate,
    /// Replace a user's authorized repository IDs
    SetUser {
        user_id: i32,
        /// Comma separated repository IDs
        #[arg(long)]
        ids: String,
        #[arg(long, default_value = "read")]
        perm: Perms,
        #[arg(long, default_value = "sourcegraph")]
        provider: ProviderType,
    },
    /// Print a user's stored permissions
    ShowUser {
        user_id: i32,
        #[arg(long, default_value = "read")]
        perm: Perms,
    },
    /// Print which of the given repositories a user may access
    Check {
        user_id: i32,
        /// Comma separated repository IDs
        #[arg(long)]
        repos: String,
        #[arg(long, default_value = "read")]
        perm: Perms,
        /// JSON provider seed used when the stored permissions are stale
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Record that code host accounts not yet created locally can access a repository
    SetPending {
        repo_id: i32,
        /// Comma separated usernames or emails
        #[arg(long)]
        bind: String,
        #[arg(long, default_value = "read")]
        perm: Perms,
    },
    /// Bind pending permissions to a newly created user
    Bind {
        user_id: i32,
        bind_id: String,
        #[arg(long, default_value = "read")]
        perm: Perms,
    },
    /// Sync a user's permissions from a JSON provider seed
    SyncUser {
        user_id: i32,
        #[arg(long)]
        seed: PathBuf,
        #[arg(long, default_value = "read")]
        perm: Perms,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();
    let config = PermsConfig::from_env()?;
    let pool = db::init(&config.database_url).await?;
    let store = PermsStore::new(pool);

    match cli.command {
        Commands::Migrate => {
            println!("Migrations applied");
        }
        Commands::SetUser { user_id, ids, perm, provider } => {
            let ids: IdSet = parse_id_list(&ids)?.into_iter().collect();
            let perms = UserPermissions::new(user_id, perm, PermKind::Repos)
                .with_ids(ids, utc_now())
                .with_provider(provider);
            store.upsert_user_permissions(&perms).await?;
            print_fields(&perms);
        }
        Commands::ShowUser { user_id, perm } => {
            match store.load_user_permissions(user_id, perm, &PermKind::Repos).await? {
                Some(perms) => {
                    print_fields(&perms);
                    println!("ids: {:?}", sorted_ids(perms.ids.as_ref()));
                }
                None => println!("no permissions stored for user {user_id}"),
            }
        }
        Commands::Check { user_id, repos, perm, seed } => {
            let provider = match seed {
                Some(path) => load_seed(&path)?,
                None => StaticProvider::new(ProviderType::Sourcegraph),
            };
            let syncer = PermsSyncer::new(Arc::new(provider), store, Arc::new(PermsCache::new()));
            let authorizer = Authorizer::new(syncer, &config);

            let candidates: Vec<Repo> = parse_id_list(&repos)?
                .into_iter()
                .map(|id| i32::try_from(id).map(|id| Repo::new(id, format!("repo-{id}"))))
                .collect::<Result<_, _>>()
                .context("repository id out of range")?;

            let authorized = authorizer.authorized_repos(user_id, perm, &candidates).await?;
            println!("{:<10} {}", "Repo", "Perm");
            for rp in authorized {
                println!("{:<10} {}", rp.repo.id, rp.perms);
            }
        }
        Commands::SetPending { repo_id, bind, perm } => {
            let bind_ids: Vec<String> = bind
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            store
                .set_repo_pending_permissions(repo_id, perm, &PermKind::Repos, &bind_ids, utc_now())
                .await?;
            println!("Recorded pending access to repo {repo_id} for {} account(s)", bind_ids.len());
        }
        Commands::Bind { user_id, bind_id, perm } => {
            match store
                .grant_pending_permissions(user_id, &bind_id, perm, &PermKind::Repos, utc_now())
                .await?
            {
                Some(perms) => print_fields(&perms),
                None => println!("no pending permissions for {bind_id}"),
            }
        }
        Commands::SyncUser { user_id, seed, perm } => {
            let provider = load_seed(&seed)?;
            let syncer = PermsSyncer::new(Arc::new(provider), store, Arc::new(PermsCache::new()));
            let perms = syncer
                .sync_user_permissions(user_id, perm, &PermKind::Repos)
                .await?;
            print_fields(&*perms);
        }
    }

    Ok(())
}

fn load_seed(path: &Path) -> anyhow::Result<StaticProvider> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read provider seed {}", path.display()))?;
    Ok(StaticProvider::from_json(&raw)?)
}

fn print_fields(record: &impl TracingFields) {
    for field in record.tracing_fields() {
        println!("{:<40} {}", field.name, field.value);
    }
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
