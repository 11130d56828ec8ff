pub mod csv;
pub mod iso8583;
