use std::io::{self, Write};
use std::sync::LazyLock;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const BANNER_ART: &str = r#"
        ____  ___          ____
       / __ \/   |        / __/___  _________ ____
      / /_/ / /| |______ / /_/ __ \/ ___/ __ `/ _ \
     / ____/ ___ /_____// __/ /_/ / /  / /_/ /  __/
    /_/   /_/  |_|     /_/  \____/_/   \__, /\___/
                                      /____/
      ∿∿∿∿∿  ◉  ∿∿∿∿∿   light in, sound out   ∿∿∿∿∿  ◉  ∿∿∿∿∿
   "#;

static BANNER_FOR_HELP: LazyLock<String> = LazyLock::new(|| format!("\n{BANNER_ART}"));

pub fn banner_for_help() -> &'static str {
    &BANNER_FOR_HELP
}

pub fn print_banner() {
    let _ = write!(
        io::stderr().lock(),
        "\n{BANNER_ART}\n\n   Photoacoustic tissue volumes{:>31}\n\n",
        format!("v{VERSION}")
    );
}
