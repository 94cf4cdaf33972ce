use chanres::Channel;

pub fn cmd_channels() {
    for channel in Channel::all() {
        println!("{:<8} {}", channel.name(), channel.description());
    }
}
