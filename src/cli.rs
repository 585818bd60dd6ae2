//! Command-line interface definitions and argument parsing

use std::net::{AddrParseError, SocketAddr};

use clap::Parser;

/// Customer segmentation service computing RFM scores over transaction data
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// Enable verbose (debug-level) logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Combine host and port into the socket address to bind.
    pub fn bind_address(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let mut args = Args {
            host: "127.0.0.1".to_string(),
            port: 9000,
            verbose: false,
        };
        assert_eq!(args.bind_address().unwrap().to_string(), "127.0.0.1:9000");

        args.host = "not an address".to_string();
        assert!(args.bind_address().is_err());
    }
}
