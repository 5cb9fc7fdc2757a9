//! 系统通知文案

pub fn connected(name: &str) -> String {
    format!("{name} connected")
}

pub fn renamed(old: &str, new: &str) -> String {
    format!("{old} is now {new}")
}

pub fn name_in_use(name: &str) -> String {
    format!("name \"{name}\" already in use")
}

pub fn disconnected(name: &str) -> String {
    format!("{name} disconnected")
}
