use std::error::Error;

use xps_sim::demos::Simple;

fn main() -> Result<(), Box<dyn Error>> {
    xps_sim::main_with(Simple::default)
}
