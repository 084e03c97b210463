pub mod smtlib_parser;
pub mod smtlib_printer;
pub mod smtlib_process;
pub mod z3_backend;
