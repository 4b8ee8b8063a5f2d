mod session;

use std::io;

fn main() -> io::Result<()> {
    session::Session::new().run(io::stdin().lock(), io::stdout().lock())
}
