//! Pokeroll server binary.
//!
//! Configuration comes from the environment:
//!
//! - `POKEROLL_ADDR` — bind address (default `127.0.0.1:8080`)
//! - `POKEROLL_DEX`  — path to a species dex JSON file (default: bundled)
//! - `RUST_LOG`      — tracing filter (default `info`)

use pokeroll::{Pokedex, PokerollServerBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr = std::env::var("POKEROLL_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let mut builder = PokerollServerBuilder::new().bind(&addr);
    if let Ok(path) = std::env::var("POKEROLL_DEX") {
        let dex = Pokedex::load(&path)?;
        tracing::info!(path, species = dex.len(), "loaded dex");
        builder = builder.dex(dex);
    }

    let server = builder.build().await?;
    tracing::info!(addr = %server.local_addr()?, "pokeroll listening");

    server.run().await?;
    Ok(())
}
