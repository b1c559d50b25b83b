#[allow(unused)]
mod builders;
#[allow(unused)]
mod mock_server;

#[allow(unused)]
pub use builders::*;
#[allow(unused)]
pub use mock_server::*;
