mod audio_decoder;
mod config;
mod notifications;
mod playback_engine;
mod player_manager;
mod player_state;
mod protocol;
mod track_loader;
mod ui_manager;

use std::path::PathBuf;
use std::thread;

use audio_decoder::AudioDecoder;
use config::{sanitize_config, Config};
use log::info;
use playback_engine::PlaybackEngine;
use player_manager::PlayerManager;
use protocol::{ConfigMessage, Message, PlayerMessage};
use tokio::sync::broadcast;
use ui_manager::UiManager;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Debug);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let track_paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if track_paths.is_empty() {
        eprintln!("Usage: trackdeck <audio file>...");
        return Ok(());
    }

    let config_dir = dirs::config_dir().ok_or("No config directory available")?;
    let config_file = config_dir.join("trackdeck.toml");

    if !config_file.exists() {
        let default_config = Config::default();
        info!(
            "Config file not found. Creating default config. path={}",
            config_file.display()
        );
        std::fs::write(&config_file, toml::to_string(&default_config)?)?;
    }

    let config_content = std::fs::read_to_string(&config_file)?;
    let config = sanitize_config(toml::from_str::<Config>(&config_content).unwrap_or_default());

    // Bus for communication between components
    let (bus_sender, _) = broadcast::channel(1024);

    // Setup player manager
    let player_bus_receiver = bus_sender.subscribe();
    let player_bus_sender = bus_sender.clone();
    thread::spawn(move || {
        let mut player_manager = PlayerManager::new(player_bus_receiver, player_bus_sender);
        player_manager.run();
    });

    // Setup audio decoder
    let decoder_bus_receiver = bus_sender.subscribe();
    let decoder_bus_sender = bus_sender.clone();
    thread::spawn(move || {
        let mut audio_decoder = AudioDecoder::new(decoder_bus_receiver, decoder_bus_sender);
        audio_decoder.run();
    });

    // Setup playback engine
    let engine_bus_receiver = bus_sender.subscribe();
    let engine_bus_sender = bus_sender.clone();
    thread::spawn(move || {
        let mut playback_engine = PlaybackEngine::new(engine_bus_receiver, engine_bus_sender);
        playback_engine.run();
    });

    // The UI subscribes before the queue is announced so it never misses the
    // initial load.
    let mut ui_manager = UiManager::new(bus_sender.subscribe(), bus_sender.clone());

    let _ = bus_sender.send(Message::Config(ConfigMessage::ConfigChanged(config)));

    let tracks = track_loader::load_tracks(&track_paths);
    if tracks.is_empty() {
        eprintln!("None of the given files could be read");
        return Ok(());
    }
    let _ = bus_sender.send(Message::Player(PlayerMessage::QueueLoaded(tracks)));

    ui_manager.run();

    info!("Application exiting");
    Ok(())
}
