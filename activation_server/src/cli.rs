use std::{env, env::VarError};

/// The server is configured from the environment. Any argument at all prints the help and the current settings.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Never add the admin token or processor keys to this list
    const DISPLAY_ENVS: [&str; 21] = [
        "RUST_LOG",
        "TAE_HOST",
        "TAE_PORT",
        "TAE_DATABASE_URL",
        "TAE_NOTIFICATION_URL",
        "TAE_CURRENCY",
        "TAE_SUCCESS_URL",
        "TAE_CANCEL_URL",
        "TAE_SESSION_TIMEOUT",
        "TAE_SESSION_LIFETIME",
        "TAE_SWEEP_INTERVAL",
        "TAE_SWEEP_MIN_AGE",
        "TAE_SWEEP_MAX_AGE",
        "TAE_SWEEP_LOOKUP_TIMEOUT",
        "TAE_ACTIVATION_INTERVAL",
        "TAE_BOOST_DAILY_RATES",
        "TAE_COMMISSION_BASIC",
        "TAE_COMMISSION_PRO",
        "TAE_COMMISSION_PREMIUM",
        "TAE_PROCESSOR_URL",
        "TAE_WEBHOOK_TOLERANCE",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<30} {val}");
    })
}
