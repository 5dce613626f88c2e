pub mod http_client;
pub mod notifier;

#[cfg(test)]
pub mod test_server;
