use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Input as Prompt;
use meshroom_client::media::{DryRunCapture, DryRunNetwork, DryRunTransport};
use meshroom_client::mesh::LinkState;
use meshroom_client::{
    ChatMessage, MeshEngine, RemoteParticipant, SessionConfig, SessionControl, SessionEvent,
    SessionSnapshot,
};
use meshroom_core::{ConnectionId, RoomId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod input;

use input::{HELP, Input, parse};

#[derive(Parser)]
#[command(name = "meshroom", version, about = "Join a meshroom room from the terminal")]
struct Cli {
    /// Signaling server WebSocket URL
    #[arg(long, env = "MESHROOM_SERVER", default_value = "ws://127.0.0.1:5000/ws", global = true)]
    server: String,

    /// Display name shown to other participants
    #[arg(long, global = true)]
    name: Option<String>,

    #[arg(long, env = "RUST_LOG", default_value = "warn", global = true)]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new room with a random id
    Create,
    /// Join an existing room
    Join { room: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let (room_id, created) = match &cli.command {
        Commands::Create => (RoomId::generate(), true),
        Commands::Join { room } => (RoomId::parse(room).context("Invalid room id")?, false),
    };

    let name = match cli.name {
        Some(name) => name,
        None => Prompt::<String>::new()
            .with_prompt("Display name")
            .interact_text()
            .context("Failed to read display name")?,
    };

    println!("{}", "🚀 Connecting to meshroom...".green().bold());
    if created {
        println!("   🆕 Created room {}", room_id.as_str().bold());
        println!("   Share it: meshroom join {}", room_id);
    }

    // Dry-run media: links are negotiated but carry no audio or video. The
    // other participants run in their own processes.
    let network = DryRunNetwork::standalone();
    let (transport, transport_events) = network.endpoint(format!("dry-run-{}", uuid::Uuid::new_v4()));
    let transport = Arc::new(transport);
    let config = SessionConfig::new(&cli.server, room_id, name);

    let mut handle = MeshEngine::connect(
        config,
        transport.clone(),
        Arc::new(DryRunCapture::new()),
        transport_events,
    )
    .await
    .with_context(|| format!("Failed to connect to {}", cli.server))?;
    let control = handle.control();

    let mut names: HashMap<ConnectionId, String> = HashMap::new();
    let mut local_id = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => {
                    let done = matches!(event, SessionEvent::Left(_));
                    simulate_dial_ins(&transport, &mut local_id, &event);
                    print_event(&event, &mut names);
                    if done {
                        break;
                    }
                }
                None => break,
            },

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Err(e) = handle_input(&control, parse(&line)).await {
                        warn!("Command failed: {}", e);
                    }
                }
                // End of input leaves the room.
                Ok(None) | Err(_) => {
                    stdin_open = false;
                    let _ = control.leave();
                }
            },

            _ = tokio::signal::ctrl_c() => {
                let _ = control.leave();
            }
        }
    }

    handle.wait().await?;
    Ok(())
}

async fn handle_input(control: &SessionControl, input: Input) -> Result<()> {
    match input {
        Input::Chat(text) => control.send_chat(text)?,
        Input::ToggleVideo => {
            control.toggle_video()?;
            let snapshot = control.snapshot().await?;
            println!("📷 video {}", on_off(snapshot.capabilities.video_enabled));
        }
        Input::ToggleAudio => {
            control.toggle_audio()?;
            let snapshot = control.snapshot().await?;
            println!("🎙  audio {}", on_off(snapshot.capabilities.audio_enabled));
        }
        Input::Peers => print_peers(&control.snapshot().await?),
        Input::Leave => control.leave()?,
        Input::Help => println!("{}", HELP.dimmed()),
        Input::Unknown(command) => println!("{} /{} (try /help)", "Unknown command".red(), command),
        Input::Empty => {}
    }
    Ok(())
}

/// Plays the side of remotes that would dial this session. Their dry-run
/// transports live in other processes and cannot reach this one.
fn simulate_dial_ins(
    transport: &DryRunTransport,
    local_id: &mut Option<ConnectionId>,
    event: &SessionEvent,
) {
    if let SessionEvent::Joined { connection_id, .. } = event {
        *local_id = Some(*connection_id);
    }
    let Some(local) = *local_id else {
        return;
    };

    let ready = |p: &RemoteParticipant| {
        p.peer_address
            .as_ready()
            .map(|address| (p.connection_id, address.to_string()))
    };
    let remotes: Vec<(ConnectionId, String)> = match event {
        SessionEvent::Joined { participants, .. } => {
            participants.iter().filter_map(ready).collect()
        }
        SessionEvent::ParticipantJoined(p) => ready(p).into_iter().collect(),
        SessionEvent::ParticipantAddressReady {
            connection_id,
            peer_address,
        } => vec![(*connection_id, peer_address.clone())],
        _ => return,
    };
    for (remote, address) in remotes {
        transport.simulate_dial_in(local, remote, &address);
    }
}

fn print_event(event: &SessionEvent, names: &mut HashMap<ConnectionId, String>) {
    match event {
        SessionEvent::Joined {
            connection_id,
            room_id,
            participants,
        } => {
            println!(
                "{} room {} as {}",
                "✨ Joined".green().bold(),
                room_id.as_str().bold(),
                connection_id.to_string().dimmed()
            );
            for p in participants {
                names.insert(p.connection_id, p.display_name.clone());
            }
            if participants.is_empty() {
                println!("   Nobody else is here yet.");
            } else {
                let list: Vec<&str> = participants.iter().map(|p| p.display_name.as_str()).collect();
                println!("   Already here: {}", list.join(", "));
            }
            println!("{}", "   Type /help for commands.".dimmed());
        }

        SessionEvent::ParticipantJoined(p) => {
            names.insert(p.connection_id, p.display_name.clone());
            println!("{} {} joined", "→".cyan(), p.display_name.bold());
        }

        SessionEvent::ParticipantLeft { connection_id } => {
            let name = names
                .remove(connection_id)
                .unwrap_or_else(|| connection_id.to_string());
            println!("{} {} left", "←".yellow(), name.bold());
        }

        SessionEvent::ParticipantToggled {
            connection_id,
            capabilities,
        } => {
            println!(
                "   {}: video {}, audio {}",
                display(names, connection_id),
                on_off(capabilities.video_enabled),
                on_off(capabilities.audio_enabled)
            );
        }

        SessionEvent::ParticipantAddressReady { connection_id, .. } => {
            println!("   {} is reachable", display(names, connection_id));
        }

        SessionEvent::LinkEstablished { remote, origin } => {
            println!(
                "{} linked with {} ({:?})",
                "🔗".green(),
                display(names, remote),
                origin
            );
        }

        SessionEvent::LinkFailed { remote, error } => {
            println!(
                "{} link to {} failed: {}",
                "⚠️ ".red(),
                display(names, remote),
                error
            );
        }

        SessionEvent::LinkClosed { remote } => {
            println!("   link to {} closed", display(names, remote));
        }

        SessionEvent::RemoteStreamReady { remote } => {
            println!("📺 receiving media from {}", display(names, remote));
        }

        SessionEvent::Chat(chat) => print_chat(chat),

        SessionEvent::MediaUnavailable(error) => {
            println!("{} {}", "Media unavailable:".red().bold(), error);
        }

        SessionEvent::ServerError(reason) => {
            println!("{} {}", "Server:".red(), reason);
        }

        SessionEvent::Left(reason) => {
            println!("{} ({:?})", "👋 Left the room".yellow().bold(), reason);
        }
    }
}

fn print_chat(chat: &ChatMessage) {
    let secs = chat
        .received_at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let time = format!(
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    );
    println!("{} {}: {}", time.dimmed(), chat.sender_name.bold(), chat.text);
}

fn print_peers(snapshot: &SessionSnapshot) {
    if snapshot.participants.is_empty() {
        println!("   Nobody else is here.");
        return;
    }
    for p in &snapshot.participants {
        let link = match snapshot.link_state(&p.connection_id) {
            LinkState::Established => "linked".green(),
            LinkState::Connecting => "connecting".yellow(),
            LinkState::Idle | LinkState::Closed => "no link".dimmed(),
        };
        println!(
            "   {} video {}, audio {}, {}",
            p.display_name.bold(),
            on_off(p.capabilities.video_enabled),
            on_off(p.capabilities.audio_enabled),
            link
        );
    }
}

fn display(names: &HashMap<ConnectionId, String>, id: &ConnectionId) -> String {
    names.get(id).cloned().unwrap_or_else(|| id.to_string())
}

fn on_off(enabled: bool) -> ColoredString {
    if enabled { "on".green() } else { "off".red() }
}
