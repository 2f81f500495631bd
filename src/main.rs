//! Terminal client for the medical consultation backend.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use medconsult_lib::chat::{ChatController, ChatError, IntakeForm};
use medconsult_lib::config::{self, EndpointConfig, PatientDataSource, RenderMode, WidgetConfig};
use medconsult_lib::terminal::TerminalView;
use medconsult_lib::transport::HttpBackend;

const WELCOME: &str = "Halo! Saya asisten konsultasi medis. \
Ceritakan **nama**, **umur** dan keluhan Anda.";

/// Command-line options. Flags override the config file and environment.
#[derive(Parser)]
#[command(name = "medconsult", version)]
struct Cli {
    /// Backend base URL (fixed endpoint mode)
    #[arg(long)]
    base_url: Option<String>,
    /// Host origin; switches the endpoint to origin mode
    #[arg(long)]
    origin: Option<String>,
    /// Patient data source: first_message | backend
    #[arg(long)]
    source: Option<PatientDataSource>,
    /// Render mode: markdown | basic
    #[arg(long)]
    render: Option<RenderMode>,
    /// Ask for the patient form before chatting
    #[arg(long)]
    intake: bool,
    /// Print the rendered HTML after each reply
    #[arg(long)]
    html: bool,
}

type Controller = ChatController<HttpBackend, TerminalView>;
type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    medconsult_lib::init_tracing();
    let cli = Cli::parse();

    let mut config = WidgetConfig::load().context("loading configuration")?;
    if let Some(url) = cli.base_url.clone() {
        config.endpoint = EndpointConfig::Fixed { url };
    }
    if cli.origin.is_some() {
        config.endpoint = EndpointConfig::Origin;
    }
    if let Some(source) = cli.source {
        config.patient_data_source = source;
    }
    if let Some(render) = cli.render {
        config.render_mode = render;
    }

    let backend = HttpBackend::from_config(&config, cli.origin.as_deref())
        .context("configuring backend")?;
    info!(
        version = config::APP_VERSION,
        base_url = %backend.endpoints().base_url,
        source = %config.patient_data_source,
        "medconsult starting"
    );

    let chat: Controller = ChatController::new(config, backend, TerminalView::new());
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    if cli.intake {
        let form = read_intake(&mut input).await?;
        match chat.start_with_intake(form).await {
            Ok(_) => after_reply(&chat, cli.html),
            Err(e) => eprintln!("{}", e.to_string().red()),
        }
    } else {
        chat.show_notice(WELCOME);
        chat.view().finish_message();
    }

    while let Some(line) = input.next_line().await? {
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/new" => match chat.new_session() {
                Ok(()) => println!("{}", "Sesi baru dimulai.".dimmed()),
                Err(e) => eprintln!("{}", e.to_string().red()),
            },
            text => match chat.send_message(text).await {
                Ok(_) => after_reply(&chat, cli.html),
                Err(ChatError::Busy) => {
                    eprintln!("{}", "Mohon tunggu balasan sebelumnya.".yellow())
                }
                Err(e) => eprintln!("{}", e.to_string().red()),
            },
        }
    }
    Ok(())
}

fn after_reply(chat: &Controller, html: bool) {
    chat.view().finish_message();
    if html {
        println!("{}", chat.view().last_html().dimmed());
    }
}

async fn read_intake(input: &mut Input) -> Result<IntakeForm> {
    Ok(IntakeForm {
        name: prompt(input, "Nama").await?,
        age: prompt(input, "Umur").await?,
        gender: prompt(input, "Jenis kelamin").await?,
        complaint: prompt(input, "Keluhan awal").await?,
    })
}

async fn prompt(input: &mut Input, label: &str) -> Result<String> {
    use std::io::Write;
    print!("{}: ", label.bold());
    std::io::stdout().flush()?;
    let line = input
        .next_line()
        .await?
        .with_context(|| format!("input closed before '{label}'"))?;
    Ok(line.trim().to_string())
}
