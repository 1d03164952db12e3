use std::sync::mpsc;

use xrx_monitors::{RandrClient, XrEventListener, XrMonitorAction, XrMonitorManager};

fn main() {
    let client = RandrClient::connect(None).expect("Failed to connect to the X server");
    let (action_tx, action_rx) = mpsc::sync_channel(16);
    let _listener = XrEventListener::spawn(client.event_source(), action_tx)
        .expect("Failed to start the listener");

    let mut manager = XrMonitorManager::new(client);
    let mut action = XrMonitorAction::Refresh;

    loop {
        let topology = manager.apply_action(&action).expect("Failed to read topology");

        println!(
            "=== {} controllers, config timestamp {} ===\n",
            topology.controllers.len(),
            topology.config_timestamp
        );
        for controller in &topology.controllers {
            match controller.mode {
                Some(mode) => println!(
                    "  crtc {}: {} at ({}, {}) -> {:?}",
                    controller.id,
                    mode.label(),
                    controller.position.x,
                    controller.position.y,
                    controller.outputs,
                ),
                None => println!("  crtc {}: free", controller.id),
            }
        }
        println!();
        for output in &topology.active_outputs {
            println!("  {} (output {})", output.name, output.id);
            println!("    modes:");
            for mode in &output.modes {
                let flag = if output.current_mode == Some(*mode) {
                    " [CURRENT]"
                } else {
                    ""
                };
                println!("      {}{}", mode.label(), flag);
            }
        }
        for output in &topology.offline_outputs {
            println!("  {} (output {}): off", output.name, output.id);
        }
        println!();

        match action_rx.recv() {
            Ok(next) => action = next,
            Err(_) => break,
        }
    }
}
