pub mod transaction_decoder;
