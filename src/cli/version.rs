/// Display version information
pub fn execute() {
    println!("consortium {}", env!("CARGO_PKG_VERSION"));
    println!("Governance client for replicated ledger consortiums");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_execute() {
        execute();
    }
}
