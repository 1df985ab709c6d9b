pub mod wsroute;
