//! Startup banner and quick guide

use crossterm::style::Stylize;

const BANNER: &str = r"
   ____  ____  _____ ______ _   __ ______ ____  __  __
  / __ \/ __ \/ ___// ____// | / //_  __// __ \/ / / /
 / / / / /_/ /\__ \/ __/  /  |/ /  / /  / /_/ / /_/ /
/ /_/ / ____/___/ / /___ / /|  /  / /  / _, _/\__, /
\____/_/    /____/_____//_/ |_/  /_/  /_/ |_|/____/
";

pub fn display_banner() {
    println!("{}", BANNER.cyan());
    println!(
        "  {} v{}\n",
        "security-persona agent REPL".dark_grey(),
        env!("CARGO_PKG_VERSION")
    );
}

pub fn display_quick_guide() {
    println!("{}", "Quick guide".bold());
    println!("  type a prompt to run it against the active agent");
    println!("  /agent <name>      switch persona (takes effect next turn)");
    println!("  /model <id>        rebind the model across the handoff graph");
    println!("  /mcp ...           manage tool-server associations");
    println!("  /help              full command list, /exit to quit\n");
}
