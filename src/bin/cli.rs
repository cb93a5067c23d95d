use clap::{Parser, Subcommand};
use docstore::config::Config;
use docstore::{error::Result, Store};
use std::io::{self, Write};
use std::path::PathBuf;

/// A simple document store CLI
#[derive(Debug, Parser)]
#[clap(name = "docstore", version = "0.1.0")]
struct Cli {
    /// Directory holding the database files
    #[clap(short, long)]
    dir: Option<PathBuf>,

    /// Optional TOML configuration file; `--dir` overrides its root_dir
    #[clap(short, long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a database
    Create { db: String },

    /// Delete a database and its file
    Drop { db: String },

    /// List the collections of a database
    Collections { db: String },

    /// Insert a JSON document
    Insert {
        db: String,
        collection: String,
        doc: String,
    },

    /// Find a document by id
    Find {
        db: String,
        collection: String,
        id: String,
    },

    /// Print every document matching a JSON query
    Query {
        db: String,
        collection: String,
        #[clap(default_value = "{}")]
        query: String,
    },

    /// Merge a JSON update into the document with the given id
    Update {
        db: String,
        collection: String,
        id: String,
        update: String,
    },

    /// Merge a JSON update into every document matching a JSON query
    UpdateWhere {
        db: String,
        collection: String,
        query: String,
        update: String,
    },

    /// Delete a document by id
    Delete {
        db: String,
        collection: String,
        id: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::new(),
    };
    if let Some(dir) = cli.dir {
        config = config.root_dir(dir);
    }

    let store = Store::open(config);

    match cli.command {
        Commands::Create { db } => {
            store.create_database(&db)?;
            println!("OK");
        }
        Commands::Drop { db } => {
            store.delete_database(&db)?;
            println!("OK");
        }
        Commands::Collections { db } => {
            for name in store.collections(&db)? {
                println!("{}", name);
            }
        }
        Commands::Insert {
            db,
            collection,
            doc,
        } => {
            let stored = store.insert_bytes(&db, &collection, doc.as_bytes())?;
            print_docs(&stored)?;
        }
        Commands::Find { db, collection, id } => {
            if let Some(doc) = store.find_by_id(&db, &collection, &id)? {
                print_docs(&doc)?;
            } else {
                println!("Document not found");
            }
        }
        Commands::Query {
            db,
            collection,
            query,
        } => {
            let docs = store.query_bytes(&db, &collection, query.as_bytes())?;
            print_docs(&docs)?;
        }
        Commands::Update {
            db,
            collection,
            id,
            update,
        } => {
            let update = docstore::document::decode(update.as_bytes())?;
            let doc = store.update_by_id(&db, &collection, &id, &update)?;
            print_docs(&doc)?;
        }
        Commands::UpdateWhere {
            db,
            collection,
            query,
            update,
        } => {
            let query = docstore::document::decode(query.as_bytes())?;
            let update = docstore::document::decode(update.as_bytes())?;
            let docs = store.update_by_query(&db, &collection, &query, &update)?;
            print_docs(&docs)?;
        }
        Commands::Delete { db, collection, id } => {
            if store.delete_by_id(&db, &collection, &id)? {
                println!("OK");
            } else {
                println!("Document not found");
            }
        }
    }

    Ok(())
}

fn print_docs(docs: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if !docs.is_empty() {
        stdout.write_all(docs)?;
        stdout.write_all(b"\n")?;
    }
    Ok(())
}
