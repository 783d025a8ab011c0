
mod attendance;
mod records;
