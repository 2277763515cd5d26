#[cfg(test)]
mod adapter;
