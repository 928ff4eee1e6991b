//! Cartwheel CLI - Database migrations and catalog management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! cw-cli migrate
//!
//! # Create a product (unpublished, zero stock)
//! cw-cli product add -n "Trail Runner" -p 2999
//!
//! # Publish it and stock it
//! cw-cli product publish <product-id>
//! cw-cli stock add <inventory-id> 25
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `product` - Create, publish and reprice products
//! - `stock` - Add and inspect stock
//! - `cart open` - Open a cart for a customer

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use cartwheel_core::{CustomerId, InventoryId, ProductId};

mod commands;

#[derive(Parser)]
#[command(name = "cw-cli")]
#[command(author, version, about = "Cartwheel CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage products
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Manage stock
    Stock {
        #[command(subcommand)]
        action: StockAction,
    },
    /// Manage carts
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Create an unpublished product with an empty inventory
    Add {
        /// Product name
        #[arg(short, long)]
        name: String,

        /// Price in minor currency units (e.g. cents)
        #[arg(short, long)]
        price: i64,

        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Make a product visible to customers
    Publish {
        /// Product ID
        id: ProductId,
    },
    /// Change a product's price (carts see it immediately, orders never do)
    Price {
        /// Product ID
        id: ProductId,

        /// New price in minor currency units
        price: i64,
    },
}

#[derive(Subcommand)]
enum StockAction {
    /// Add units to an inventory
    Add {
        /// Inventory ID
        id: InventoryId,

        /// Units to add
        amount: u32,
    },
    /// Show available units for a product
    Show {
        /// Product ID
        product_id: ProductId,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Open a cart for a customer (no-op if one exists)
    Open {
        /// Customer ID
        customer_id: CustomerId,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Product { action } => match action {
            ProductAction::Add {
                name,
                price,
                description,
            } => commands::catalog::add_product(name, description, price).await?,
            ProductAction::Publish { id } => commands::catalog::publish(id).await?,
            ProductAction::Price { id, price } => commands::catalog::change_price(id, price).await?,
        },
        Commands::Stock { action } => match action {
            StockAction::Add { id, amount } => commands::catalog::add_stock(id, amount).await?,
            StockAction::Show { product_id } => commands::catalog::show_stock(product_id).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Open { customer_id } => commands::catalog::open_cart(customer_id).await?,
        },
    }
    Ok(())
}
