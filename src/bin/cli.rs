use clap::{Parser, Subcommand};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;

const TOKEN_FILE: &str = ".techfix_token";

#[derive(Parser)]
#[command(name = "techfix-cli")]
#[command(about = "CLI for the TechFix ERP API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    Logout,
    Me,
    /// List products
    Inventory,
    AddProduct {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        sku: String,
        #[arg(short, long)]
        price: f64,
        #[arg(short = 'q', long, default_value_t = 0)]
        stock: i64,
        #[arg(short, long)]
        brand: Option<String>,
        /// Attribute map as JSON, e.g. '{"ram": "16GB"}'
        #[arg(short, long, default_value = "{}")]
        attributes: String,
    },
    DeleteProduct {
        #[arg(short, long)]
        id: u64,
    },
    Brands,
    AddBrand {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    Users,
    AddUser {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long, default_value = "user")]
        role: String,
    },
    Stats,
    Dre,
    Optimize {
        #[arg(short, long)]
        vehicle: u64,
        /// Task ids; the vehicle's assigned tasks when omitted
        #[arg(short, long, value_delimiter = ',')]
        tasks: Option<Vec<u64>>,
    },
    /// Sell products, each item as `<product id>:<quantity>`
    Checkout {
        #[arg(required = true)]
        items: Vec<String>,
        #[arg(short, long)]
        customer: Option<String>,
    },
}

#[derive(Deserialize)]
struct LoginResponse {
    username: String,
    role: String,
    token: String,
}

/// Every API call goes through here so the token handling stays in one place.
async fn request(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<(), Box<dyn std::error::Error>> {
    let token = fs::read_to_string(TOKEN_FILE).unwrap_or_default();
    let mut builder = client.request(method, url);
    if !token.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {}", token.trim()));
    }
    if let Some(body) = body {
        builder = builder.json(&body);
    }

    let res = builder.send().await?;
    let status = res.status();
    let text = res.text().await?;
    let pretty = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or(text);
    if status.is_success() {
        println!("{pretty}");
    } else {
        println!("Request failed ({status}): {pretty}");
    }
    Ok(())
}

fn parse_item(raw: &str) -> Result<Value, String> {
    let (id, quantity) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected <id>:<quantity>, got `{raw}`"))?;
    let id: u64 = id.parse().map_err(|_| format!("bad product id in `{raw}`"))?;
    let quantity: i64 = quantity.parse().map_err(|_| format!("bad quantity in `{raw}`"))?;
    Ok(json!({ "id": id, "quantity": quantity }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let api = format!("{}/api", cli.url.trim_end_matches('/'));

    match cli.command {
        Commands::Login { username, password } => {
            let res = client
                .post(format!("{api}/login"))
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await?;
            if res.status().is_success() {
                let body: LoginResponse = res.json().await?;
                fs::write(TOKEN_FILE, body.token)?;
                println!("Logged in as {} ({}). Token saved to {TOKEN_FILE}", body.username, body.role);
            } else {
                println!("Login failed: {}", res.text().await?);
            }
        }
        Commands::Logout => {
            request(&client, Method::POST, &format!("{api}/logout"), None).await?;
            let _ = fs::remove_file(TOKEN_FILE);
            println!("Logged out. Token removed.");
        }
        Commands::Me => request(&client, Method::GET, &format!("{api}/me"), None).await?,
        Commands::Inventory => request(&client, Method::GET, &format!("{api}/inventory"), None).await?,
        Commands::AddProduct { name, sku, price, stock, brand, attributes } => {
            let attributes: Value = serde_json::from_str(&attributes)?;
            let body = json!({
                "name": name,
                "sku": sku,
                "price": price,
                "stock_quantity": stock,
                "brand": brand,
                "attributes": attributes,
            });
            request(&client, Method::POST, &format!("{api}/inventory"), Some(body)).await?;
        }
        Commands::DeleteProduct { id } => {
            request(&client, Method::DELETE, &format!("{api}/inventory/{id}"), None).await?;
        }
        Commands::Brands => request(&client, Method::GET, &format!("{api}/brands"), None).await?,
        Commands::AddBrand { name, description } => {
            let body = json!({ "name": name, "description": description });
            request(&client, Method::POST, &format!("{api}/brands"), Some(body)).await?;
        }
        Commands::Users => request(&client, Method::GET, &format!("{api}/users"), None).await?,
        Commands::AddUser { username, password, role } => {
            let body = json!({ "username": username, "password": password, "role": role });
            request(&client, Method::POST, &format!("{api}/users"), Some(body)).await?;
        }
        Commands::Stats => {
            request(&client, Method::GET, &format!("{api}/dashboard/stats"), None).await?;
        }
        Commands::Dre => request(&client, Method::GET, &format!("{api}/finance/dre"), None).await?,
        Commands::Optimize { vehicle, tasks } => {
            let body = json!({ "vehicleId": vehicle, "taskIds": tasks });
            request(&client, Method::POST, &format!("{api}/tasks/optimize"), Some(body)).await?;
        }
        Commands::Checkout { items, customer } => {
            let items = items
                .iter()
                .map(|raw| parse_item(raw))
                .collect::<Result<Vec<_>, _>>()?;
            let body = json!({ "items": items, "customer_name": customer });
            request(&client, Method::POST, &format!("{api}/pos/checkout"), Some(body)).await?;
        }
    }

    Ok(())
}
