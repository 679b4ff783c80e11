use std::error::Error;

use xps_sim::demos::RandomWalk;

fn main() -> Result<(), Box<dyn Error>> {
    xps_sim::main_with(RandomWalk::default)
}
