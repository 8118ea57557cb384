use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    // Credentials, passkeys and the callback secret are deliberately absent from this list
    const DISPLAY_ENVS: [&str; 16] = [
        "RUST_LOG",
        "DUKA_HOST",
        "DUKA_PORT",
        "DUKA_DATABASE_URL",
        "DUKA_USE_X_FORWARDED_FOR",
        "DUKA_USE_FORWARDED",
        "DUKA_RATE_LIMIT_MAX_ATTEMPTS",
        "DUKA_RATE_LIMIT_WINDOW",
        "DUKA_REQUIRE_CALLBACK_TOKEN",
        "DUKA_MPESA_ENVIRONMENT",
        "DUKA_MPESA_SHORT_CODE",
        "DUKA_MPESA_CALLBACK_URL",
        "DUKA_MPESA_MAX_AMOUNT",
        "DUKA_MPESA_PUSH_TIMEOUT",
        "DUKA_MPESA_QUERY_TIMEOUT",
        "DUKA_STRIPE_API_BASE",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
