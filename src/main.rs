use chrono_tz::Tz;
use clap::Parser;
use color_eyre::eyre::{WrapErr, eyre};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use xades_signer::{
    config::Config,
    crypto,
    telemetry,
    xades::{SigningRequest, XadesSigner, XadesTemplate},
};

#[derive(Parser)]
#[command(
    name = "xades-signer",
    about = "Embed a XAdES-BES enveloped signature into an XML document",
    version
)]
struct Cli {
    /// PEM file with the private key and the signer certificate
    keyfile: PathBuf,

    /// XML document to sign
    xmlfile: PathBuf,

    /// Value of the Id attribute of the element to sign
    id: String,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cli = Cli::parse();
    let config = Config::load()?;
    tracing::debug!("Loaded configuration: {:?}", config);

    let timezone: Tz = config
        .signer
        .timezone
        .parse()
        .map_err(|e| eyre!("invalid signer.timezone {:?}: {e}", config.signer.timezone))?;

    let mut signer = XadesSigner::new(crypto::backend_from_config(&config.crypto))?
        .with_timezone(timezone)
        .with_output_comments(config.signer.output_with_comments);
    if let Some(path) = &config.signer.template_path {
        let template = XadesTemplate::from_file(path)
            .await
            .wrap_err_with(|| format!("loading template {}", path.display()))?;
        signer = signer.with_template(template);
    }

    let document = tokio::fs::read(&cli.xmlfile)
        .await
        .wrap_err_with(|| format!("reading {}", cli.xmlfile.display()))?;
    let request = SigningRequest::new(cli.keyfile, document, cli.id);

    let signed = signer.sign(&request).await?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&signed).await?;
    stdout.flush().await?;
    Ok(())
}
