/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Chat(String),
    ToggleVideo,
    ToggleAudio,
    Peers,
    Leave,
    Help,
    Unknown(String),
    Empty,
}

pub const HELP: &str = "\
  /video   toggle your camera
  /audio   toggle your microphone
  /peers   list participants and links
  /leave   leave the room (also /quit)
  /help    show this help
  anything else is sent as chat";

pub fn parse(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    let Some(command) = line.strip_prefix('/') else {
        return Input::Chat(line.to_string());
    };
    match command.to_ascii_lowercase().as_str() {
        "video" | "v" => Input::ToggleVideo,
        "audio" | "a" | "mute" => Input::ToggleAudio,
        "peers" | "p" => Input::Peers,
        "leave" | "quit" | "q" => Input::Leave,
        "help" | "h" | "?" => Input::Help,
        other => Input::Unknown(other.to_string()),
    }
}
