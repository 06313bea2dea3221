//! Data commands that need the pool database loaded.

use std::fs::File;
use std::io;

use color_eyre::eyre::{bail, Result, WrapErr};

use bitmark_state::Store;

/// `block-times FILE BEGIN END`: write time and difficulty for a range of
/// blocks to a text file; `''` or `-` writes to stdout, `0` means min/max.
pub fn block_times(store: &Store, arguments: &[String]) -> Result<()> {
    if arguments.len() < 3 {
        bail!("missing arguments (use '' for stdout, and '0' for min/max)");
    }

    let begin: u64 = arguments[1]
        .parse()
        .wrap_err("error in begin block number")?;
    let end: u64 = arguments[2].parse().wrap_err("error in end block number")?;

    match arguments[0].as_str() {
        "" | "-" => {
            let stdout = io::stdout();
            store.print_block_times(&mut stdout.lock(), begin, end)?;
        }
        filename => {
            let mut file =
                File::create(filename).wrap_err_with(|| format!("cannot create: {:?}", filename))?;
            store.print_block_times(&mut file, begin, end)?;
        }
    }
    Ok(())
}
