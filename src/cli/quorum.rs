//! Print the quorum for a consortium size.

use consortium::governance::quorum;

pub fn execute(members: usize) -> Result<(), Box<dyn std::error::Error>> {
    if members == 0 {
        return Err("A consortium needs at least one member".into());
    }
    println!("{} members: quorum is {}", members, quorum(members));
    Ok(())
}
