pub mod margin;
