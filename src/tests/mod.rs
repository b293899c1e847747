mod session_controller;
