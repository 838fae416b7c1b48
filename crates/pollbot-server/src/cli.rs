use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pollbot-server", version, about = "Chat polling service")]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "pollbot.toml")]
    pub config: String,

    /// Override `[server] bind_address`.
    #[arg(long)]
    pub bind: Option<String>,
}
