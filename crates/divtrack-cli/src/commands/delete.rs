use divtrack_core::DividendId;

use crate::commands::common::Session;
use crate::error::CliError;

pub async fn run_delete(session: &Session, id: i64) -> Result<(), CliError> {
    let id = DividendId::new(id);
    if !session.store.remove(id).await? {
        return Err(CliError::DividendNotFound(id));
    }

    println!("{id}");
    Ok(())
}
